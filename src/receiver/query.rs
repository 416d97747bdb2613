//! Query endpoint: `/spanlink.TraceQuery/GetTraces`.
//!
//! Returns the whole store snapshot as `{"traces": [...]}`. There is no
//! server-side filtering; the query layer works on the client copy.

use super::codec::RawJsonCodec;
use crate::core::TraceSnapshot;
use crate::storage::TraceStore;
use bytes::Bytes;
use std::sync::Arc;
use tonic::codegen::{empty_body, http, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::{NamedService, UnaryService};
use tonic::{body::BoxBody, Status};

/// Fully qualified service name, used for routing.
pub const TRACE_QUERY_SERVICE: &str = "spanlink.TraceQuery";

/// Method path of the snapshot call.
pub const GET_TRACES_PATH: &str = "/spanlink.TraceQuery/GetTraces";

/// Serializes the current store snapshot.
pub fn snapshot_payload(store: &TraceStore) -> Result<Bytes, Status> {
    let snapshot = TraceSnapshot {
        traces: store.snapshot(),
    };
    serde_json::to_vec(&snapshot)
        .map(Bytes::from)
        .map_err(|e| Status::internal(format!("Failed to serialize traces: {}", e)))
}

/// gRPC service answering snapshot requests from a shared store.
#[derive(Clone)]
pub struct TraceQueryServer {
    store: Arc<TraceStore>,
}

impl TraceQueryServer {
    pub fn new(store: Arc<TraceStore>) -> Self {
        Self { store }
    }
}

impl NamedService for TraceQueryServer {
    const NAME: &'static str = TRACE_QUERY_SERVICE;
}

struct GetTracesSvc(Arc<TraceStore>);

impl UnaryService<Bytes> for GetTracesSvc {
    type Response = Bytes;
    type Future = BoxFuture<tonic::Response<Self::Response>, Status>;

    fn call(&mut self, _request: tonic::Request<Bytes>) -> Self::Future {
        let store = Arc::clone(&self.0);
        Box::pin(async move {
            let payload = snapshot_payload(&store)?;
            tracing::debug!(bytes = payload.len(), "Serving trace snapshot");
            Ok(tonic::Response::new(payload))
        })
    }
}

impl<B> Service<http::Request<B>> for TraceQueryServer
where
    B: tonic::codegen::Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match req.uri().path() {
            GET_TRACES_PATH => {
                let store = Arc::clone(&self.store);
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(RawJsonCodec);
                    Ok(grpc.unary(GetTracesSvc(store), req).await)
                })
            },
            _ => Box::pin(async move {
                let mut response = http::Response::new(empty_body());
                let headers = response.headers_mut();
                headers.insert(Status::GRPC_STATUS, (tonic::Code::Unimplemented as i32).into());
                headers.insert(http::header::CONTENT_TYPE, tonic::metadata::GRPC_CONTENT_TYPE);
                Ok(response)
            }),
        }
    }
}
