//! REST client for the NSX-T Manager API (`/api/v1`).

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::model::*;
use super::{ClientError, NsxClient, Reply, Result, StatusCode};
use crate::config::NsxConfig;

const EDGE_CLUSTERS: &str = "/api/v1/edge-clusters";
const DHCP_PROFILES: &str = "/api/v1/dhcp/server-profiles";
const DHCP_SERVERS: &str = "/api/v1/dhcp/servers";
const LOGICAL_SWITCHES: &str = "/api/v1/logical-switches";
const LOGICAL_PORTS: &str = "/api/v1/logical-ports";

/// NSX-T Manager client using HTTP basic authentication.
pub struct HttpNsxClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpNsxClient {
    pub fn new(config: &NsxConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_ssl)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let host = config.host.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "NSX-T request");
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Send a request and map the status: 404 becomes `NotFound`, any other
    /// non-2xx status becomes `Status`.
    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>)> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok((status, body.to_vec()))
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Reply<T>> {
        let (status, body) = self.execute(request).await?;
        Ok(Reply::new(status, serde_json::from_slice(&body)?))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Reply<T>> {
        self.call(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Reply<T>> {
        self.call(self.request(Method::POST, path).json(body)).await
    }

    async fn put<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Reply<T>> {
        self.call(self.request(Method::PUT, path).json(body)).await
    }

    async fn delete(&self, request: RequestBuilder) -> Result<StatusCode> {
        let (status, _) = self.execute(request).await?;
        Ok(status)
    }

    /// Fetch every page of a list endpoint, following `cursor`.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Reply<Vec<T>>> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self.request(Method::GET, path);
            if let Some(c) = &cursor {
                request = request.query(&[("cursor", c)]);
            }
            let page: Reply<ListResult<T>> = self.call(request).await?;
            results.extend(page.value.results);
            match page.value.cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => return Ok(Reply::new(page.status, results)),
            }
        }
    }
}

#[async_trait]
impl NsxClient for HttpNsxClient {
    async fn list_edge_clusters(&self) -> Result<Reply<Vec<EdgeCluster>>> {
        self.list_all(EDGE_CLUSTERS).await
    }

    async fn read_dhcp_profile(&self, id: &str) -> Result<Reply<DhcpProfile>> {
        self.get(&format!("{}/{}", DHCP_PROFILES, id)).await
    }

    async fn create_dhcp_profile(&self, profile: &DhcpProfile) -> Result<Reply<DhcpProfile>> {
        self.post(DHCP_PROFILES, profile).await
    }

    async fn update_dhcp_profile(
        &self,
        id: &str,
        profile: &DhcpProfile,
    ) -> Result<Reply<DhcpProfile>> {
        self.put(&format!("{}/{}", DHCP_PROFILES, id), profile).await
    }

    async fn delete_dhcp_profile(&self, id: &str) -> Result<StatusCode> {
        self.delete(self.request(Method::DELETE, &format!("{}/{}", DHCP_PROFILES, id)))
            .await
    }

    async fn read_dhcp_server(&self, id: &str) -> Result<Reply<LogicalDhcpServer>> {
        self.get(&format!("{}/{}", DHCP_SERVERS, id)).await
    }

    async fn create_dhcp_server(
        &self,
        server: &LogicalDhcpServer,
    ) -> Result<Reply<LogicalDhcpServer>> {
        self.post(DHCP_SERVERS, server).await
    }

    async fn update_dhcp_server(
        &self,
        id: &str,
        server: &LogicalDhcpServer,
    ) -> Result<Reply<LogicalDhcpServer>> {
        self.put(&format!("{}/{}", DHCP_SERVERS, id), server).await
    }

    async fn delete_dhcp_server(&self, id: &str) -> Result<StatusCode> {
        self.delete(self.request(Method::DELETE, &format!("{}/{}", DHCP_SERVERS, id)))
            .await
    }

    async fn list_logical_switches(&self) -> Result<Reply<Vec<LogicalSwitch>>> {
        self.list_all(LOGICAL_SWITCHES).await
    }

    async fn read_logical_port(&self, id: &str) -> Result<Reply<LogicalPort>> {
        self.get(&format!("{}/{}", LOGICAL_PORTS, id)).await
    }

    async fn create_logical_port(&self, port: &LogicalPort) -> Result<Reply<LogicalPort>> {
        self.post(LOGICAL_PORTS, port).await
    }

    async fn update_logical_port(
        &self,
        id: &str,
        port: &LogicalPort,
    ) -> Result<Reply<LogicalPort>> {
        self.put(&format!("{}/{}", LOGICAL_PORTS, id), port).await
    }

    async fn delete_logical_port(&self, id: &str, detach: bool) -> Result<StatusCode> {
        let request = self
            .request(Method::DELETE, &format!("{}/{}", LOGICAL_PORTS, id))
            .query(&[("detach", detach)]);
        self.delete(request).await
    }

    async fn read_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<Reply<DhcpIpPool>> {
        self.get(&format!("{}/{}/ip-pools/{}", DHCP_SERVERS, server_id, id))
            .await
    }

    async fn create_dhcp_ip_pool(
        &self,
        server_id: &str,
        pool: &DhcpIpPool,
    ) -> Result<Reply<DhcpIpPool>> {
        self.post(&format!("{}/{}/ip-pools", DHCP_SERVERS, server_id), pool)
            .await
    }

    async fn update_dhcp_ip_pool(
        &self,
        server_id: &str,
        id: &str,
        pool: &DhcpIpPool,
    ) -> Result<Reply<DhcpIpPool>> {
        self.put(
            &format!("{}/{}/ip-pools/{}", DHCP_SERVERS, server_id, id),
            pool,
        )
        .await
    }

    async fn delete_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<StatusCode> {
        let path = format!("{}/{}/ip-pools/{}", DHCP_SERVERS, server_id, id);
        self.delete(self.request(Method::DELETE, &path)).await
    }
}
