//! Filter and query layer over a fetched trace snapshot.
//!
//! Parsing ([`parser`]) validates caller input before anything is fetched;
//! execution ([`executor`]) is a pure function of the snapshot, the options
//! and the current time.

pub mod ast;
pub mod executor;
pub mod parser;

pub use ast::{AttributePattern, SinceWindow, TraceTarget, WhereClause, WindowUnit};
pub use executor::{execute, QueryOptions, QueryOutcome};
pub use parser::{parse_filter_patterns, parse_since, parse_where_clauses, resolve_target};
