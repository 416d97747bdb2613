//! Query client for a running listener.
//!
//! Fetches the full trace snapshot over the JSON query endpoint. An
//! unreachable or misbehaving listener reads as "no traces" through
//! [`TraceQueryClient::fetch_traces`]; callers that need the cause use
//! [`TraceQueryClient::try_fetch`].

use crate::core::{Config, Result, SpanlinkError, TraceGroup, TraceSnapshot};
use crate::receiver::codec::RawJsonCodec;
use crate::receiver::GET_TRACES_PATH;
use bytes::Bytes;
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Endpoint;

/// Client for `/spanlink.TraceQuery/GetTraces`.
#[derive(Debug, Clone)]
pub struct TraceQueryClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TraceQueryClient {
    pub fn new<S: Into<String>>(host: S, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Client pointed at the configured listener port and client host.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.client.host.clone(), config.server.port, config.client.timeout)
    }

    pub fn endpoint_uri(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    /// Fetch the snapshot, reporting any failure.
    pub async fn try_fetch(&self) -> Result<Vec<TraceGroup>> {
        let endpoint = Endpoint::from_shared(self.endpoint_uri())
            .map_err(|e| SpanlinkError::config(format!("Invalid listener address: {}", e)))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        let channel = endpoint.connect().await.map_err(|e| {
            SpanlinkError::network(format!("Cannot reach trace listener at {}: {}", self.endpoint_uri(), e))
        })?;

        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready().await?;
        let response = grpc
            .unary::<Bytes, Bytes, _>(
                tonic::Request::new(Bytes::new()),
                PathAndQuery::from_static(GET_TRACES_PATH),
                RawJsonCodec,
            )
            .await?;

        let snapshot: TraceSnapshot = serde_json::from_slice(&response.into_inner())?;
        Ok(snapshot.traces)
    }

    /// Fetch the snapshot; any failure yields an empty list.
    pub async fn fetch_traces(&self) -> Vec<TraceGroup> {
        match self.try_fetch().await {
            Ok(traces) => traces,
            Err(e) => {
                tracing::debug!(
                    endpoint = %self.endpoint_uri(),
                    category = e.category(),
                    error = %e,
                    "Trace listener unavailable, treating as no traces"
                );
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uri() {
        let client = TraceQueryClient::new("127.0.0.1", 4317, Duration::from_secs(3));
        assert_eq!(client.endpoint_uri(), "http://127.0.0.1:4317");

        let v6 = TraceQueryClient::new("::1", 4317, Duration::from_secs(3));
        assert_eq!(v6.endpoint_uri(), "http://[::1]:4317");
    }

    #[test]
    fn test_from_config() {
        let config = crate::core::ConfigBuilder::new().port(5317).build().unwrap();
        let client = TraceQueryClient::from_config(&config);
        assert_eq!(client.endpoint_uri(), "http://127.0.0.1:5317");
    }

    #[tokio::test]
    async fn test_unreachable_listener_degrades_to_empty() {
        // Grab a free port and release it so nothing is listening there.
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let client = TraceQueryClient::new("127.0.0.1", port, Duration::from_millis(500));

        let err = client.try_fetch().await.unwrap_err();
        assert!(matches!(err, SpanlinkError::Network(_)), "{:?}", err);
        assert!(client.fetch_traces().await.is_empty());
    }
}
