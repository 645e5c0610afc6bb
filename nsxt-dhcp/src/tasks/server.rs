//! Logical DHCP server serving the worker subnet.

use async_trait::async_trait;

use super::diff::FieldDiff;
use super::{
    DESCRIPTION, DeletableTask, OwnedResource, Result, Task, TaskMeta, converge, remove, require,
};
use crate::address::{self, DHCP_SERVER_OFFSET, GATEWAY_OFFSET};
use crate::error::TaskError;
use crate::nsx::{self, Ipv4DhcpServer, LogicalDhcpServer, NsxClient, Reply, StatusCode};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};

pub struct DhcpServerTask {
    meta: TaskMeta,
}

impl DhcpServerTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("DHCP server"),
        }
    }
}

impl Default for DhcpServerTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for DhcpServerTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference {
        &state.dhcp.server_id
    }

    async fn ensure(
        &self,
        client: &dyn NsxClient,
        spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<()> {
        converge(self, client, spec, state).await
    }

    fn deletable(&self) -> Option<&dyn DeletableTask> {
        Some(self)
    }
}

#[async_trait]
impl DeletableTask for DhcpServerTask {
    async fn ensure_deleted(
        &self,
        client: &dyn NsxClient,
        _spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<bool> {
        remove(self, client, state).await
    }
}

#[async_trait]
impl OwnedResource for DhcpServerTask {
    type Object = LogicalDhcpServer;
    type Scope = ();

    fn slot<'s>(&self, state: &'s mut InfraState) -> &'s mut Reference {
        &mut state.dhcp.server_id
    }

    fn scope(&self, _state: &InfraState) -> Result<()> {
        Ok(())
    }

    fn desired(&self, spec: &InfraSpec, state: &InfraState) -> Result<LogicalDhcpServer> {
        let dhcp_server_ip = address::cidr_host_and_prefix(&spec.worker_network, DHCP_SERVER_OFFSET)
            .map_err(|source| TaskError::AddressComputation {
                what: "DHCP server IP",
                source,
            })?;
        let gateway_ip = address::cidr_host(&spec.worker_network, GATEWAY_OFFSET).map_err(
            |source| TaskError::AddressComputation {
                what: "gateway IP",
                source,
            },
        )?;

        Ok(LogicalDhcpServer {
            id: None,
            display_name: spec.full_cluster_name(),
            description: DESCRIPTION.to_string(),
            dhcp_profile_id: require(&state.dhcp.profile_id, "DHCP profile id")?,
            ipv4_dhcp_server: Some(Ipv4DhcpServer {
                dhcp_server_ip,
                gateway_ip: gateway_ip.to_string(),
                dns_nameservers: spec.dns_servers.clone(),
            }),
            tags: spec.common_tags(),
        })
    }

    fn diff(&self, current: &LogicalDhcpServer, desired: &LogicalDhcpServer) -> FieldDiff {
        let cur = current.ipv4_dhcp_server.as_ref();
        let want = desired.ipv4_dhcp_server.as_ref();
        FieldDiff::new()
            .field("display_name", &current.display_name, &desired.display_name)
            .field("dhcp_profile_id", &current.dhcp_profile_id, &desired.dhcp_profile_id)
            .field(
                "dhcp_server_ip",
                &cur.map(|s| &s.dhcp_server_ip),
                &want.map(|s| &s.dhcp_server_ip),
            )
            .field(
                "gateway_ip",
                &cur.map(|s| &s.gateway_ip),
                &want.map(|s| &s.gateway_ip),
            )
            .field(
                "dns_nameservers",
                &cur.map(|s| &s.dns_nameservers),
                &want.map(|s| &s.dns_nameservers),
            )
            .tags(&current.tags, &desired.tags)
    }

    fn id_of(object: &LogicalDhcpServer) -> Option<&str> {
        object.id.as_deref()
    }

    async fn read(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
    ) -> nsx::Result<Reply<LogicalDhcpServer>> {
        client.read_dhcp_server(id).await
    }

    async fn create(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        object: &LogicalDhcpServer,
    ) -> nsx::Result<Reply<LogicalDhcpServer>> {
        client.create_dhcp_server(object).await
    }

    async fn update(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
        object: &LogicalDhcpServer,
    ) -> nsx::Result<Reply<LogicalDhcpServer>> {
        client.update_dhcp_server(id, object).await
    }

    async fn delete(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
    ) -> nsx::Result<StatusCode> {
        client.delete_dhcp_server(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{FakeNsx, Kind, Op, test_spec};

    fn state_with_profile() -> InfraState {
        let mut state = InfraState::default();
        state.dhcp.profile_id.set("profile-1");
        state
    }

    #[tokio::test]
    async fn test_server_addresses() {
        let nsx = FakeNsx::new();
        let mut state = state_with_profile();
        DhcpServerTask::new()
            .ensure(&nsx, &test_spec(), &mut state)
            .await
            .unwrap();

        let server = nsx.server(state.dhcp.server_id.id().unwrap()).unwrap();
        let v4 = server.ipv4_dhcp_server.unwrap();
        assert_eq!(v4.dhcp_server_ip, "10.0.0.2/24");
        assert_eq!(v4.gateway_ip, "10.0.0.1");
        assert_eq!(server.dhcp_profile_id, "profile-1");
    }

    #[tokio::test]
    async fn test_dns_order_matters() {
        let nsx = FakeNsx::new();
        let task = DhcpServerTask::new();
        let mut spec = test_spec();
        let mut state = state_with_profile();
        task.ensure(&nsx, &spec, &mut state).await.unwrap();

        spec.dns_servers.reverse();
        task.ensure(&nsx, &spec, &mut state).await.unwrap();
        assert_eq!(nsx.count(Kind::Server, Op::Update), 1);

        let server = nsx.server(state.dhcp.server_id.id().unwrap()).unwrap();
        assert_eq!(server.ipv4_dhcp_server.unwrap().dns_nameservers, spec.dns_servers);
    }

    #[tokio::test]
    async fn test_missing_ipv4_block_is_repaired() {
        let nsx = FakeNsx::new();
        let task = DhcpServerTask::new();
        let spec = test_spec();
        let mut state = state_with_profile();
        task.ensure(&nsx, &spec, &mut state).await.unwrap();

        let id = state.dhcp.server_id.id().unwrap().to_string();
        nsx.edit_server(&id, |s| s.ipv4_dhcp_server = None);
        task.ensure(&nsx, &spec, &mut state).await.unwrap();

        assert_eq!(nsx.count(Kind::Server, Op::Update), 1);
        assert!(nsx.server(&id).unwrap().ipv4_dhcp_server.is_some());
    }

    #[tokio::test]
    async fn test_subnet_too_small() {
        let nsx = FakeNsx::new();
        let mut spec = test_spec();
        spec.worker_network = "10.0.0.0/31".to_string();
        let mut state = state_with_profile();

        let err = DhcpServerTask::new()
            .ensure(&nsx, &spec, &mut state)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::AddressComputation {
                what: "DHCP server IP",
                ..
            }
        ));
        assert!(!state.dhcp.server_id.is_set());
        assert_eq!(nsx.writes(), 0);
    }
}
