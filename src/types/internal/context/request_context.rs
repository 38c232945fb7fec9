use std::net::IpAddr;

use poem::Request;

use crate::types::internal::{auth::Claims, role::Role};

use super::{request_id::RequestId, request_source::RequestSource};

/// Request context that flows through all layers
///
/// Contains contextual information about the current request that is needed
/// for logging, auditing, and tracing across API, coordinator, and store layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// IP address of the client making the request
    pub ip_address: Option<IpAddr>,

    /// Unique identifier for this request (for tracing across layers)
    pub request_id: RequestId,

    /// Whether the request carries a verified bearer token
    pub authenticated: bool,

    /// Decoded claims if authenticated
    pub claims: Option<Claims>,

    /// Source of the request (API, CLI, or System)
    pub source: RequestSource,

    /// Actor who initiated the operation
    pub actor_id: String,
}

impl RequestContext {
    /// Unauthenticated API context for public endpoints
    pub fn for_api(ip_address: Option<IpAddr>) -> Self {
        Self {
            ip_address,
            request_id: RequestId::new(),
            authenticated: false,
            claims: None,
            source: RequestSource::API,
            actor_id: "anonymous".to_owned(),
        }
    }

    /// Build an unauthenticated context from an incoming HTTP request
    pub fn from_request(req: &Request) -> Self {
        Self::for_api(Self::extract_ip_address(req))
    }

    /// Create a RequestContext for CLI operations
    pub fn for_cli(command_name: &str) -> Self {
        Self {
            ip_address: None,
            request_id: RequestId::new(),
            authenticated: false,
            claims: None,
            source: RequestSource::CLI,
            actor_id: format!("cli:{}", command_name),
        }
    }

    /// Create a RequestContext for system operations
    pub fn for_system(operation_name: &str) -> Self {
        Self {
            ip_address: None,
            request_id: RequestId::new(),
            authenticated: false,
            claims: None,
            source: RequestSource::System,
            actor_id: format!("system:{}", operation_name),
        }
    }

    /// Extract IP address from request headers
    ///
    /// Checks X-Forwarded-For, X-Real-IP, and falls back to remote address.
    pub fn extract_ip_address(req: &Request) -> Option<IpAddr> {
        // Check X-Forwarded-For header (proxy/load balancer)
        if let Some(forwarded) = req.header("X-Forwarded-For") {
            if let Some(ip) = forwarded.split(',').next() {
                if let Ok(ip) = ip.trim().parse() {
                    return Some(ip);
                }
            }
        }

        // Check X-Real-IP header (nginx)
        if let Some(real_ip) = req.header("X-Real-IP") {
            if let Ok(ip) = real_ip.trim().parse() {
                return Some(ip);
            }
        }

        req.remote_addr().as_socket_addr().map(|addr| addr.ip())
    }

    /// Set the ip_address
    pub fn with_ip_address(mut self, ip_address: IpAddr) -> Self {
        self.ip_address = Some(ip_address);
        self
    }

    /// Set authentication state with claims; actor becomes the token subject
    pub fn with_auth(mut self, claims: Claims) -> Self {
        self.authenticated = true;
        self.actor_id = claims.sub.clone();
        self.claims = Some(claims);
        self
    }

    /// Set the actor_id
    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    /// Authenticated user id, if any
    pub fn user_id(&self) -> Option<&str> {
        self.claims.as_ref().map(|c| c.sub.as_str())
    }

    /// Role decoded from the bearer token, if any
    pub fn role(&self) -> Option<Role> {
        self.claims.as_ref().map(|c| c.role)
    }

    /// IP address rendered for storage
    pub fn ip_string(&self) -> Option<String> {
        self.ip_address.map(|ip| ip.to_string())
    }
}
