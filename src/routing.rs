// ============================================================================
// Route Table & Permission Resolution
// ============================================================================
//
// The route table is an ordered list of upstream groups, each holding an
// ordered list of (route, method, role) permissions. Resolution is a pure
// function over that table:
//
// 1. strip the gateway prefix ("/api/v1")
// 2. first group whose Prefix is a prefix of the internal path
// 3. first permission in that group whose Method equals the request method
//    and whose Route is a prefix of the internal path
//
// First match wins at both levels. Table order is part of the configuration
// contract: a broad group listed before a narrower one shadows it.
//
// ============================================================================

use anyhow::{Context, Result};
use axum::http::Method;
use serde::Deserialize;

/// Role value meaning "forward without authentication"
pub const PUBLIC_ROLE: &str = "NONE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredRole {
    /// No bearer token needed
    Public,
    /// A valid, ACTIVE token is needed; the role is forwarded upstream
    Role(String),
}

impl RequiredRole {
    pub fn parse(value: &str) -> Self {
        if value == PUBLIC_ROLE {
            RequiredRole::Public
        } else {
            RequiredRole::Role(value.to_string())
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, RequiredRole::Public)
    }
}

#[derive(Debug, Clone)]
pub struct Permission {
    pub route: String,
    pub method: Method,
    pub role: RequiredRole,
}

#[derive(Debug, Clone)]
pub struct RouteGroup {
    pub prefix: String,
    pub host: String,
    pub permissions: Vec<Permission>,
}

/// Raw `APIs` entry as it appears in the YAML properties file
#[derive(Debug, Clone, Deserialize)]
pub struct RouteGroupSpec {
    #[serde(rename = "Prefix")]
    pub prefix: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Routes", default)]
    pub routes: Vec<PermissionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionSpec {
    #[serde(rename = "Route")]
    pub route: String,
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "Role")]
    pub role: String,
}

/// Ordered, validated, immutable after load
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    groups: Vec<RouteGroup>,
}

impl RouteTable {
    pub fn new(groups: Vec<RouteGroup>) -> Self {
        Self { groups }
    }

    /// Validate raw YAML entries, preserving their order
    pub fn from_specs(specs: Vec<RouteGroupSpec>) -> Result<Self> {
        let mut groups = Vec::with_capacity(specs.len());
        for (index, spec) in specs.into_iter().enumerate() {
            if !spec.prefix.starts_with('/') {
                anyhow::bail!("APIs[{}]: Prefix must start with '/', got {:?}", index, spec.prefix);
            }
            let host = spec.host.trim_end_matches('/').to_string();
            let url = reqwest::Url::parse(&host)
                .with_context(|| format!("APIs[{}]: Host {:?} is not a valid URL", index, spec.host))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                anyhow::bail!("APIs[{}]: Host must be an http(s) URL, got {:?}", index, spec.host);
            }

            let mut permissions = Vec::with_capacity(spec.routes.len());
            for (route_index, route) in spec.routes.into_iter().enumerate() {
                let method = Method::from_bytes(route.method.trim().to_uppercase().as_bytes())
                    .with_context(|| {
                        format!(
                            "APIs[{}].Routes[{}]: invalid Method {:?}",
                            index, route_index, route.method
                        )
                    })?;
                if route.role.trim().is_empty() {
                    anyhow::bail!(
                        "APIs[{}].Routes[{}]: Role must not be empty (use {} for public routes)",
                        index,
                        route_index,
                        PUBLIC_ROLE
                    );
                }
                permissions.push(Permission {
                    route: route.route,
                    method,
                    role: RequiredRole::parse(route.role.trim()),
                });
            }

            groups.push(RouteGroup {
                prefix: spec.prefix,
                host,
                permissions,
            });
        }
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[RouteGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First group whose prefix is a prefix of `internal_path`
    pub fn match_group(&self, internal_path: &str) -> Option<&RouteGroup> {
        self.groups
            .iter()
            .find(|group| internal_path.starts_with(&group.prefix))
    }
}

impl RouteGroup {
    /// First permission for `method` whose route is a prefix of `internal_path`
    pub fn match_permission(&self, internal_path: &str, method: &Method) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| p.method == *method && internal_path.starts_with(&p.route))
    }
}

/// Where an authorized request goes and what it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub upstream_host: String,
    pub upstream_path: String,
    pub required_role: RequiredRole,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("could not find the route {path}")]
    RouteNotFound { path: String },

    #[error("could not find the route for {path} and method {method}")]
    PermissionNotFound { path: String, method: Method },

    #[error("path {path} contains dot segments or encoded separators")]
    UnsafePath { path: String },
}

/// True when any segment would be rewritten by URL normalization downstream:
/// `.`/`..` (literal or percent-encoded) or an encoded `/` or `\`.
fn is_unsafe_path(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    if lowered.contains('\\') || lowered.contains("%2f") || lowered.contains("%5c") {
        return true;
    }
    lowered
        .split('/')
        .map(|segment| segment.replace("%2e", "."))
        .any(|segment| segment == "." || segment == "..")
}

/// Resolves request paths against a [`RouteTable`]
pub struct PermissionResolver {
    gateway_prefix: String,
    table: RouteTable,
}

impl PermissionResolver {
    pub fn new(gateway_prefix: impl Into<String>, table: RouteTable) -> Self {
        Self {
            gateway_prefix: gateway_prefix.into(),
            table,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// The upstream path is exactly the internal path that was matched, so
    /// paths that a URL parser would rewrite are refused before matching.
    pub fn resolve(&self, request_path: &str, method: &Method) -> Result<Resolution, RouteError> {
        if is_unsafe_path(request_path) {
            return Err(RouteError::UnsafePath {
                path: request_path.to_string(),
            });
        }

        let internal_path = request_path
            .strip_prefix(self.gateway_prefix.as_str())
            .ok_or_else(|| RouteError::RouteNotFound {
                path: request_path.to_string(),
            })?;

        let group = self
            .table
            .match_group(internal_path)
            .ok_or_else(|| RouteError::RouteNotFound {
                path: internal_path.to_string(),
            })?;

        let permission = group
            .match_permission(internal_path, method)
            .ok_or_else(|| RouteError::PermissionNotFound {
                path: internal_path.to_string(),
                method: method.clone(),
            })?;

        Ok(Resolution {
            upstream_host: group.host.clone(),
            upstream_path: internal_path.to_string(),
            required_role: permission.role.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
- Prefix: /users
  Host: http://users.internal:8080/
  Routes:
    - Route: /users/admin
      Method: GET
      Role: ADMIN
    - Route: /users
      Method: GET
      Role: USER
    - Route: /users
      Method: post
      Role: NONE
- Prefix: /users/special
  Host: http://special.internal
  Routes:
    - Route: /users/special
      Method: GET
      Role: NONE
- Prefix: /orders
  Host: https://orders.internal
  Routes:
    - Route: /orders
      Method: DELETE
      Role: ADMIN
"#;

    fn resolver() -> PermissionResolver {
        let specs: Vec<RouteGroupSpec> = serde_yaml::from_str(TABLE).unwrap();
        PermissionResolver::new("/api/v1", RouteTable::from_specs(specs).unwrap())
    }

    #[test]
    fn test_resolves_host_path_and_role() {
        let resolution = resolver().resolve("/api/v1/orders/42", &Method::DELETE).unwrap();
        assert_eq!(resolution.upstream_host, "https://orders.internal");
        assert_eq!(resolution.upstream_path, "/orders/42");
        assert_eq!(resolution.required_role, RequiredRole::Role("ADMIN".to_string()));
    }

    #[test]
    fn test_first_group_wins_over_more_specific_later_group() {
        let resolution = resolver()
            .resolve("/api/v1/users/special/1", &Method::GET)
            .unwrap();
        assert_eq!(resolution.upstream_host, "http://users.internal:8080");
        assert_eq!(resolution.required_role, RequiredRole::Role("USER".to_string()));
    }

    #[test]
    fn test_first_permission_wins_in_table_order() {
        let resolver = resolver();
        let admin = resolver.resolve("/api/v1/users/admin/panel", &Method::GET).unwrap();
        assert_eq!(admin.required_role, RequiredRole::Role("ADMIN".to_string()));

        let user = resolver.resolve("/api/v1/users/42", &Method::GET).unwrap();
        assert_eq!(user.required_role, RequiredRole::Role("USER".to_string()));
    }

    #[test]
    fn test_method_is_case_normalised_and_none_is_public() {
        let resolution = resolver().resolve("/api/v1/users", &Method::POST).unwrap();
        assert_eq!(resolution.required_role, RequiredRole::Public);
        assert!(!resolution.required_role.requires_auth());
    }

    #[test]
    fn test_unknown_group_and_unknown_permission() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("/api/v1/invoices", &Method::GET),
            Err(RouteError::RouteNotFound {
                path: "/invoices".to_string()
            })
        );
        assert_eq!(
            resolver.resolve("/api/v1/orders/1", &Method::GET),
            Err(RouteError::PermissionNotFound {
                path: "/orders/1".to_string(),
                method: Method::GET,
            })
        );
    }

    #[test]
    fn test_prefix_match_is_anchored() {
        let resolver = resolver();
        // "/users" appears in the path but not at the start
        assert!(matches!(
            resolver.resolve("/api/v1/admin/users", &Method::GET),
            Err(RouteError::RouteNotFound { .. })
        ));
        // gateway prefix itself must lead the path
        assert!(matches!(
            resolver.resolve("/users/api/v1/users", &Method::GET),
            Err(RouteError::RouteNotFound { .. })
        ));
    }

    #[test]
    fn test_dot_segments_are_refused_before_matching() {
        let resolver = resolver();
        for path in [
            "/api/v1/users/../orders/1",
            "/api/v1/users/admin/../42",
            "/api/v1/users/%2e%2e/orders/1",
            "/api/v1/users/%2E%2e/orders/1",
            "/api/v1/users/.%2e/orders/1",
            "/api/v1/users/./admin",
            "/api/v1/users/admin/..",
            "/api/v1/../api/v1/users",
            "/api/v1/users/x%2f..%2forders",
            "/api/v1/users/x%5C..%5Corders",
        ] {
            assert!(
                matches!(
                    resolver.resolve(path, &Method::POST),
                    Err(RouteError::UnsafePath { .. })
                ),
                "{} was not refused",
                path
            );
        }
    }

    #[test]
    fn test_dots_inside_segments_are_ordinary() {
        let resolver = resolver();
        let resolution = resolver
            .resolve("/api/v1/users/report..v2/file.tar.gz", &Method::GET)
            .unwrap();
        assert_eq!(resolution.upstream_path, "/users/report..v2/file.tar.gz");
    }

    #[test]
    fn test_invalid_tables_are_rejected() {
        let bad_prefix: Vec<RouteGroupSpec> =
            serde_yaml::from_str("- {Prefix: users, Host: 'http://x', Routes: []}").unwrap();
        assert!(RouteTable::from_specs(bad_prefix).is_err());

        let bad_host: Vec<RouteGroupSpec> =
            serde_yaml::from_str("- {Prefix: /users, Host: 'ftp://x', Routes: []}").unwrap();
        assert!(RouteTable::from_specs(bad_host).is_err());

        let bad_method: Vec<RouteGroupSpec> = serde_yaml::from_str(
            "- {Prefix: /users, Host: 'http://x', Routes: [{Route: /users, Method: 'G T', Role: USER}]}",
        )
        .unwrap();
        assert!(RouteTable::from_specs(bad_method).is_err());

        let empty_role: Vec<RouteGroupSpec> = serde_yaml::from_str(
            "- {Prefix: /users, Host: 'http://x', Routes: [{Route: /users, Method: GET, Role: ''}]}",
        )
        .unwrap();
        assert!(RouteTable::from_specs(empty_role).is_err());
    }
}
