use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};

use crate::session::Identity;

pub const X_AUTH_USERNAME: HeaderName = HeaderName::from_static("x-auth-username");
pub const X_AUTH_ROLE: HeaderName = HeaderName::from_static("x-auth-role");

/// Connection-scoped headers (RFC 9110 §7.6.1) that are never relayed
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively; an empty token is no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    const SCHEME: &str = "Bearer ";

    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let token = value[SCHEME.len()..].trim();
    (!token.is_empty()).then_some(token)
}

fn is_hop_by_hop(name: &HeaderName, connection_listed: &[String]) -> bool {
    HOP_BY_HOP.contains(name) || connection_listed.iter().any(|h| h == name.as_str())
}

/// Header names nominated as hop-by-hop by the `Connection` header itself
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Header set sent upstream.
///
/// Inbound headers minus hop-by-hop headers, `Host` and `Content-Length`
/// (both recomputed by the client), with any caller-supplied identity headers
/// removed before the authenticated identity, if any, is inserted.
pub fn build_upstream_headers(
    inbound: &HeaderMap,
    identity: Option<&Identity>,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let listed = connection_listed(inbound);
    let mut outbound = HeaderMap::with_capacity(inbound.len() + 2);

    for (name, value) in inbound {
        if is_hop_by_hop(name, &listed)
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
        {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    outbound.remove(X_AUTH_USERNAME);
    outbound.remove(X_AUTH_ROLE);

    if let Some(identity) = identity {
        insert_identity(&mut outbound, identity)?;
    }

    Ok(outbound)
}

/// Set `X-Auth-Username` and `X-Auth-Role`, replacing any existing values
pub fn insert_identity(
    headers: &mut HeaderMap,
    identity: &Identity,
) -> Result<(), InvalidHeaderValue> {
    headers.insert(X_AUTH_USERNAME, HeaderValue::from_str(&identity.username)?);
    headers.insert(X_AUTH_ROLE, HeaderValue::from_str(&identity.role)?);
    Ok(())
}

/// Header set relayed back to the client: everything end-to-end, verbatim
pub fn build_downstream_headers(upstream: &HeaderMap) -> HeaderMap {
    let listed = connection_listed(upstream);
    let mut relayed = HeaderMap::with_capacity(upstream.len());

    for (name, value) in upstream {
        if !is_hop_by_hop(name, &listed) {
            relayed.append(name.clone(), value.clone());
        }
    }
    relayed
}
