//! Address pool of the DHCP server.

use async_trait::async_trait;

use super::diff::FieldDiff;
use super::{
    DESCRIPTION, DeletableTask, OwnedResource, Result, Task, TaskMeta, converge, remove, require,
};
use crate::address::{self, GATEWAY_OFFSET, POOL_END_OFFSET, POOL_START_OFFSET};
use crate::error::TaskError;
use crate::nsx::{self, DhcpIpPool, IpPoolRange, NsxClient, Reply, StatusCode};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};

/// Lease time in seconds.
pub const LEASE_TIME: i64 = 7200;
/// Pool usage (percent) raising an error alarm.
pub const ERROR_THRESHOLD: i64 = 98;
/// Pool usage (percent) raising a warning alarm.
pub const WARNING_THRESHOLD: i64 = 70;

pub struct DhcpIpPoolTask {
    meta: TaskMeta,
}

impl DhcpIpPoolTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("DHCP IP pool"),
        }
    }
}

impl Default for DhcpIpPoolTask {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_host(spec: &InfraSpec, offset: i64, what: &'static str) -> Result<String> {
    address::cidr_host(&spec.worker_network, offset)
        .map(|addr| addr.to_string())
        .map_err(|source| TaskError::AddressComputation { what, source })
}

#[async_trait]
impl Task for DhcpIpPoolTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference {
        &state.dhcp.ip_pool_id
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
impl DeletableTask for DhcpIpPoolTask {
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
impl OwnedResource for DhcpIpPoolTask {
    type Object = DhcpIpPool;
    /// Id of the owning DHCP server.
    type Scope = String;

    fn slot<'s>(&self, state: &'s mut InfraState) -> &'s mut Reference {
        &mut state.dhcp.ip_pool_id
    }

    fn scope(&self, state: &InfraState) -> Result<String> {
        require(&state.dhcp.server_id, "DHCP server id")
    }

    fn delete_scope(&self, state: &InfraState) -> Result<Option<String>> {
        Ok(state.dhcp.server_id.id().map(str::to_owned))
    }

    fn desired(&self, spec: &InfraSpec, _state: &InfraState) -> Result<DhcpIpPool> {
        let gateway_ip = worker_host(spec, GATEWAY_OFFSET, "gateway IP")?;
        let start = worker_host(spec, POOL_START_OFFSET, "start IP of pool")?;
        let end = worker_host(spec, POOL_END_OFFSET, "end IP of pool")?;

        Ok(DhcpIpPool {
            id: None,
            display_name: spec.full_cluster_name(),
            description: DESCRIPTION.to_string(),
            gateway_ip,
            lease_time: LEASE_TIME,
            error_threshold: ERROR_THRESHOLD,
            warning_threshold: WARNING_THRESHOLD,
            allocation_ranges: vec![IpPoolRange { start, end }],
            tags: spec.common_tags(),
        })
    }

    fn diff(&self, current: &DhcpIpPool, desired: &DhcpIpPool) -> FieldDiff {
        FieldDiff::new()
            .field("display_name", &current.display_name, &desired.display_name)
            .field("gateway_ip", &current.gateway_ip, &desired.gateway_ip)
            .field("lease_time", &current.lease_time, &desired.lease_time)
            .field("error_threshold", &current.error_threshold, &desired.error_threshold)
            .field(
                "warning_threshold",
                &current.warning_threshold,
                &desired.warning_threshold,
            )
            .field(
                "allocation_ranges",
                &current.allocation_ranges,
                &desired.allocation_ranges,
            )
            .tags(&current.tags, &desired.tags)
    }

    fn id_of(object: &DhcpIpPool) -> Option<&str> {
        object.id.as_deref()
    }

    async fn read(
        &self,
        client: &dyn NsxClient,
        server_id: &String,
        id: &str,
    ) -> nsx::Result<Reply<DhcpIpPool>> {
        client.read_dhcp_ip_pool(server_id, id).await
    }

    async fn create(
        &self,
        client: &dyn NsxClient,
        server_id: &String,
        object: &DhcpIpPool,
    ) -> nsx::Result<Reply<DhcpIpPool>> {
        client.create_dhcp_ip_pool(server_id, object).await
    }

    async fn update(
        &self,
        client: &dyn NsxClient,
        server_id: &String,
        id: &str,
        object: &DhcpIpPool,
    ) -> nsx::Result<Reply<DhcpIpPool>> {
        client.update_dhcp_ip_pool(server_id, id, object).await
    }

    async fn delete(
        &self,
        client: &dyn NsxClient,
        server_id: &String,
        id: &str,
    ) -> nsx::Result<StatusCode> {
        client.delete_dhcp_ip_pool(server_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{FakeNsx, Kind, Op, test_spec};

    #[tokio::test]
    async fn test_pool_range_from_worker_network() {
        let nsx = FakeNsx::new();
        let server_id = nsx.seed_server("profile-1");
        let mut state = InfraState::default();
        state.dhcp.server_id.set(server_id.as_str());

        DhcpIpPoolTask::new()
            .ensure(&nsx, &test_spec(), &mut state)
            .await
            .unwrap();

        let pool = nsx.pool(state.dhcp.ip_pool_id.id().unwrap()).unwrap();
        assert_eq!(pool.gateway_ip, "10.0.0.1");
        assert_eq!(
            pool.allocation_ranges,
            vec![IpPoolRange {
                start: "10.0.0.10".to_string(),
                end: "10.0.0.254".to_string(),
            }]
        );
        assert_eq!(pool.lease_time, LEASE_TIME);
        assert_eq!(pool.error_threshold, ERROR_THRESHOLD);
        assert_eq!(pool.warning_threshold, WARNING_THRESHOLD);
    }

    #[tokio::test]
    async fn test_pool_without_server_fails_without_create() {
        let nsx = FakeNsx::new();
        let mut state = InfraState::default();

        let err = DhcpIpPoolTask::new()
            .ensure(&nsx, &test_spec(), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::MissingDependency("DHCP server id")));
        assert_eq!(nsx.count(Kind::Pool, Op::Create), 0);
        assert!(!state.dhcp.ip_pool_id.is_set());
    }

    #[tokio::test]
    async fn test_threshold_drift_is_corrected() {
        let nsx = FakeNsx::new();
        let task = DhcpIpPoolTask::new();
        let spec = test_spec();
        let mut state = InfraState::default();
        state.dhcp.server_id.set(nsx.seed_server("profile-1"));
        task.ensure(&nsx, &spec, &mut state).await.unwrap();

        // Unchanged thresholds must not trigger an update.
        task.ensure(&nsx, &spec, &mut state).await.unwrap();
        assert_eq!(nsx.count(Kind::Pool, Op::Update), 0);

        let id = state.dhcp.ip_pool_id.id().unwrap().to_string();
        nsx.edit_pool(&id, |p| p.warning_threshold = 50);
        task.ensure(&nsx, &spec, &mut state).await.unwrap();
        assert_eq!(nsx.count(Kind::Pool, Op::Update), 1);
        assert_eq!(nsx.pool(&id).unwrap().warning_threshold, WARNING_THRESHOLD);
    }

    #[tokio::test]
    async fn test_pool_without_server_is_forgotten_on_delete() {
        let nsx = FakeNsx::new();
        let task = DhcpIpPoolTask::new();
        let mut state = InfraState::default();
        state.dhcp.ip_pool_id.set("pool-1");

        let deleted = task
            .ensure_deleted(&nsx, &test_spec(), &mut state)
            .await
            .unwrap();
        assert!(!deleted);
        assert!(!state.dhcp.ip_pool_id.is_set());
        assert!(nsx.calls().is_empty());
    }

    #[tokio::test]
    async fn test_small_subnet_has_no_pool_range() {
        let nsx = FakeNsx::new();
        let mut spec = test_spec();
        spec.worker_network = "10.0.0.0/29".to_string();
        let mut state = InfraState::default();
        state.dhcp.server_id.set(nsx.seed_server("profile-1"));

        let err = DhcpIpPoolTask::new()
            .ensure(&nsx, &spec, &mut state)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::AddressComputation {
                what: "start IP of pool",
                ..
            }
        ));
    }
}
