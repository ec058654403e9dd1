// ============================================================================
// Forwarding Proxy
// ============================================================================
//
// Every /api/v1/* request that is not token issuance or revocation ends up
// here. Pipeline:
// - Resolve path + method against the route table (404 on miss)
// - Authenticate the bearer token if the permission requires a role (401)
// - Rebuild the header set with the caller's identity injected
// - Dispatch to the upstream host (502 on transport failure, no retry)
// - Relay the upstream status, headers and body
//
// ============================================================================

pub mod headers;
pub mod router;
pub mod service_client;

pub use router::forward_request;
pub use service_client::{UpstreamClient, UpstreamError};
