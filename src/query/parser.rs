//! Query option parsing using nom.
//!
//! Every function here validates before any trace data is looked at, and
//! returns [`SpanlinkError::Query`] with a message meant for the caller.

use super::ast::*;
use crate::core::{Result, SpanlinkError};
use nom::{
    bytes::complete::{take_while1, take_while_m_n},
    character::complete::{char, digit1, one_of, space0},
    combinator::{all_consuming, map, map_res, rest},
    sequence::{delimited, pair, separated_pair},
    IResult,
};

/// Split repeatable, comma-separated `--filter` values into patterns.
pub fn parse_filter_patterns<S: AsRef<str>>(raw: &[S]) -> Result<Vec<AttributePattern>> {
    let mut patterns = Vec::new();
    for value in raw {
        for token in value.as_ref().split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(SpanlinkError::query("Filter contains empty tokens."));
            }
            patterns.push(AttributePattern::new(token));
        }
    }
    Ok(patterns)
}

/// Parse `key=value` clauses. All malformed clauses are reported together.
pub fn parse_where_clauses<S: AsRef<str>>(raw: &[S]) -> Result<Vec<WhereClause>> {
    let mut clauses = Vec::new();
    let mut invalid = Vec::new();

    for value in raw {
        let value = value.as_ref();
        match parse_where_clause(value) {
            Some(clause) => clauses.push(clause),
            None => invalid.push(value.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(SpanlinkError::query(format!(
            "Invalid --where filter(s): {}. Use key=value.",
            invalid.join(", ")
        )));
    }
    Ok(clauses)
}

fn parse_where_clause(input: &str) -> Option<WhereClause> {
    if input.matches('=').count() != 1 {
        return None;
    }
    let (_, (key, value)) = where_clause(input).ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(WhereClause {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn where_clause(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming(separated_pair(
        delimited(space0, take_while1(is_key_char), space0),
        char('='),
        rest,
    ))(input)
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// Parse a `--since` window such as `30m`, `2h` or `7d`.
///
/// Anything unparsable, and a zero amount, mean "no window".
pub fn parse_since(input: &str) -> Option<SinceWindow> {
    let (_, window) = since_window(input.trim()).ok()?;
    if window.amount == 0 {
        return None;
    }
    Some(window)
}

fn since_window(input: &str) -> IResult<&str, SinceWindow> {
    all_consuming(map(
        pair(map_res(digit1, str::parse::<u64>), window_unit),
        |(amount, unit)| SinceWindow { amount, unit },
    ))(input)
}

fn window_unit(input: &str) -> IResult<&str, WindowUnit> {
    map(one_of("mhd"), |unit| match unit {
        'm' => WindowUnit::Minutes,
        'h' => WindowUnit::Hours,
        _ => WindowUnit::Days,
    })(input)
}

/// Resolve the positional target.
///
/// Without a token the target is `any` when the caller asked for a listing,
/// a window or a limit, and `last` otherwise.
pub fn resolve_target(
    token: Option<&str>,
    list: bool,
    since_given: bool,
    limit_given: bool,
) -> Result<TraceTarget> {
    let token = match token.map(str::trim) {
        None | Some("") => {
            return Ok(if list || since_given || limit_given {
                TraceTarget::Any
            } else {
                TraceTarget::Last
            });
        },
        Some(token) => token,
    };

    match token.to_ascii_lowercase().as_str() {
        "last" => return Ok(TraceTarget::Last),
        "any" => return Ok(TraceTarget::Any),
        _ => {},
    }

    if list {
        return Err(SpanlinkError::query("Target and --list cannot be used together."));
    }

    let lower = token.to_ascii_lowercase();
    match lower.chars().count() {
        8 => {
            if hex_id(&lower, 8).is_err() || is_all_zero(&lower) {
                return Err(SpanlinkError::query("Short trace ID must be 8 hex characters."));
            }
            Ok(TraceTarget::ShortPrefix(lower))
        },
        32 => {
            if hex_id(&lower, 32).is_err() || is_all_zero(&lower) {
                return Err(SpanlinkError::query("Trace ID must be 32 hex characters."));
            }
            Ok(TraceTarget::Exact(lower))
        },
        _ => Err(SpanlinkError::query("Trace ID must be 8 or 32 hex characters.")),
    }
}

fn hex_id(input: &str, len: usize) -> IResult<&str, &str> {
    all_consuming(take_while_m_n(len, len, |c: char| c.is_ascii_hexdigit()))(input)
}

fn is_all_zero(id: &str) -> bool {
    id.chars().all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_filter_patterns() {
        let patterns = parse_filter_patterns(&["http.*, llm.model", "agent.name"]).unwrap();
        let raw: Vec<_> = patterns.iter().map(AttributePattern::as_str).collect();
        assert_eq!(raw, vec!["http.*", "llm.model", "agent.name"]);
    }

    #[test]
    fn test_empty_filter_token_rejected() {
        let err = parse_filter_patterns(&["http.*,,llm.model"]).unwrap_err();
        assert_eq!(err.to_string(), "Filter contains empty tokens.");
        assert!(parse_filter_patterns(&[" "]).is_err());
    }

    #[test]
    fn test_parse_where_clauses() {
        let clauses = parse_where_clauses(&["http.status_code=200", " agent.name = planner "]).unwrap();
        assert_eq!(
            clauses,
            vec![
                WhereClause {
                    key: "http.status_code".to_string(),
                    value: "200".to_string()
                },
                WhereClause {
                    key: "agent.name".to_string(),
                    value: "planner".to_string()
                },
            ]
        );

        let guid = parse_where_clauses(&["guid:x-request-id=abc"]).unwrap();
        assert_eq!(guid[0].key, "guid:x-request-id");
    }

    #[test]
    fn test_invalid_where_clauses_reported_together() {
        let err = parse_where_clauses(&["novalue=", "a=b=c", "ok=1", "bad key=1", "plain"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid --where filter(s): novalue=, a=b=c, bad key=1, plain. Use key=value."
        );
    }

    #[test]
    fn test_parse_since() {
        assert_eq!(
            parse_since("30m"),
            Some(SinceWindow {
                amount: 30,
                unit: WindowUnit::Minutes
            })
        );
        assert_eq!(parse_since(" 2h ").map(|w| w.duration().as_secs()), Some(7200));
        assert_eq!(parse_since("1d").map(|w| w.duration().as_secs()), Some(86_400));
        assert_eq!(parse_since("0h"), None);
        assert_eq!(parse_since("h"), None);
        assert_eq!(parse_since("5s"), None);
        assert_eq!(parse_since("1.5h"), None);
        assert_eq!(parse_since(""), None);
    }

    #[test]
    fn test_default_target() {
        assert_eq!(resolve_target(None, false, false, false).unwrap(), TraceTarget::Last);
        assert_eq!(resolve_target(None, true, false, false).unwrap(), TraceTarget::Any);
        assert_eq!(resolve_target(None, false, true, false).unwrap(), TraceTarget::Any);
        assert_eq!(resolve_target(None, false, false, true).unwrap(), TraceTarget::Any);
        assert_eq!(resolve_target(Some("any"), false, false, false).unwrap(), TraceTarget::Any);
        assert_eq!(resolve_target(Some("last"), true, false, false).unwrap(), TraceTarget::Last);
    }

    #[test]
    fn test_target_validation() {
        assert_eq!(
            resolve_target(Some("0AF76519"), false, false, false).unwrap(),
            TraceTarget::ShortPrefix("0af76519".to_string())
        );
        assert_eq!(
            resolve_target(Some("0af7651916cd43dd8448eb211c80319c"), false, false, false).unwrap(),
            TraceTarget::Exact("0af7651916cd43dd8448eb211c80319c".to_string())
        );

        let cases = [
            ("00000000", "Short trace ID must be 8 hex characters."),
            ("0af7651z", "Short trace ID must be 8 hex characters."),
            ("00000000000000000000000000000000", "Trace ID must be 32 hex characters."),
            ("0af7651916cd43dd8448eb211c80319g", "Trace ID must be 32 hex characters."),
            ("abc", "Trace ID must be 8 or 32 hex characters."),
        ];
        for (token, message) in cases {
            let err = resolve_target(Some(token), false, false, false).unwrap_err();
            assert_eq!(err.to_string(), message, "token {token}");
        }
    }

    #[test]
    fn test_target_with_list_rejected() {
        let err = resolve_target(Some("0af76519"), true, false, false).unwrap_err();
        assert_eq!(err.to_string(), "Target and --list cannot be used together.");
    }
}
