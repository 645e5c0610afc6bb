//! Remote NSX-T Manager API.
//!
//! The engine only talks to NSX-T through the [`NsxClient`] trait:
//! - [`HttpNsxClient`]: REST client for a real NSX-T Manager
//! - [`crate::test_util::FakeNsx`]: in-memory backend for tests

pub mod http;
pub mod model;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpNsxClient;
pub use model::*;
pub use reqwest::StatusCode;

/// Successful reply: the decoded object plus the HTTP status it came with.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: StatusCode,
    pub value: T,
}

impl<T> Reply<T> {
    pub fn new(status: StatusCode, value: T) -> Self {
        Self { status, value }
    }
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Object not found")]
    NotFound,

    #[error("HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// True if the remote object does not exist (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound => true,
            ClientError::Status { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Operations the engine needs from NSX-T, per resource kind.
///
/// Edge clusters and logical switches are never owned, so only listing is
/// required for them. List calls return every page.
#[async_trait]
pub trait NsxClient: Send + Sync {
    async fn list_edge_clusters(&self) -> Result<Reply<Vec<EdgeCluster>>>;

    async fn read_dhcp_profile(&self, id: &str) -> Result<Reply<DhcpProfile>>;
    async fn create_dhcp_profile(&self, profile: &DhcpProfile) -> Result<Reply<DhcpProfile>>;
    async fn update_dhcp_profile(
        &self,
        id: &str,
        profile: &DhcpProfile,
    ) -> Result<Reply<DhcpProfile>>;
    async fn delete_dhcp_profile(&self, id: &str) -> Result<StatusCode>;

    async fn read_dhcp_server(&self, id: &str) -> Result<Reply<LogicalDhcpServer>>;
    async fn create_dhcp_server(
        &self,
        server: &LogicalDhcpServer,
    ) -> Result<Reply<LogicalDhcpServer>>;
    async fn update_dhcp_server(
        &self,
        id: &str,
        server: &LogicalDhcpServer,
    ) -> Result<Reply<LogicalDhcpServer>>;
    async fn delete_dhcp_server(&self, id: &str) -> Result<StatusCode>;

    async fn list_logical_switches(&self) -> Result<Reply<Vec<LogicalSwitch>>>;

    async fn read_logical_port(&self, id: &str) -> Result<Reply<LogicalPort>>;
    async fn create_logical_port(&self, port: &LogicalPort) -> Result<Reply<LogicalPort>>;
    async fn update_logical_port(&self, id: &str, port: &LogicalPort)
    -> Result<Reply<LogicalPort>>;
    /// Delete a logical port; `detach` forces removal of its attachment first.
    async fn delete_logical_port(&self, id: &str, detach: bool) -> Result<StatusCode>;

    async fn read_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<Reply<DhcpIpPool>>;
    async fn create_dhcp_ip_pool(
        &self,
        server_id: &str,
        pool: &DhcpIpPool,
    ) -> Result<Reply<DhcpIpPool>>;
    async fn update_dhcp_ip_pool(
        &self,
        server_id: &str,
        id: &str,
        pool: &DhcpIpPool,
    ) -> Result<Reply<DhcpIpPool>>;
    async fn delete_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<StatusCode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(ClientError::NotFound.is_not_found());
        assert!(
            ClientError::Status {
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            }
            .is_not_found()
        );
        assert!(
            !ClientError::Status {
                status: StatusCode::BAD_REQUEST,
                body: "in use".to_string(),
            }
            .is_not_found()
        );
    }
}
