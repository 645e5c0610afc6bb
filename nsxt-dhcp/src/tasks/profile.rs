//! DHCP server profile, bound to the edge cluster.

use async_trait::async_trait;

use super::diff::FieldDiff;
use super::{
    DESCRIPTION, DeletableTask, OwnedResource, Result, Task, TaskMeta, converge, remove, require,
};
use crate::nsx::{self, DhcpProfile, NsxClient, Reply, StatusCode};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};

pub struct DhcpProfileTask {
    meta: TaskMeta,
}

impl DhcpProfileTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("DHCP profile"),
        }
    }
}

impl Default for DhcpProfileTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for DhcpProfileTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference {
        &state.dhcp.profile_id
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
impl DeletableTask for DhcpProfileTask {
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
impl OwnedResource for DhcpProfileTask {
    type Object = DhcpProfile;
    type Scope = ();

    fn slot<'s>(&self, state: &'s mut InfraState) -> &'s mut Reference {
        &mut state.dhcp.profile_id
    }

    fn scope(&self, _state: &InfraState) -> Result<()> {
        Ok(())
    }

    fn desired(&self, spec: &InfraSpec, state: &InfraState) -> Result<DhcpProfile> {
        Ok(DhcpProfile {
            id: None,
            display_name: spec.full_cluster_name(),
            description: DESCRIPTION.to_string(),
            edge_cluster_id: require(&state.dhcp.edge_cluster_id, "edge cluster id")?,
            tags: spec.common_tags(),
        })
    }

    fn diff(&self, current: &DhcpProfile, desired: &DhcpProfile) -> FieldDiff {
        FieldDiff::new()
            .field("display_name", &current.display_name, &desired.display_name)
            .field("edge_cluster_id", &current.edge_cluster_id, &desired.edge_cluster_id)
            .tags(&current.tags, &desired.tags)
    }

    fn id_of(object: &DhcpProfile) -> Option<&str> {
        object.id.as_deref()
    }

    async fn read(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
    ) -> nsx::Result<Reply<DhcpProfile>> {
        client.read_dhcp_profile(id).await
    }

    async fn create(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        object: &DhcpProfile,
    ) -> nsx::Result<Reply<DhcpProfile>> {
        client.create_dhcp_profile(object).await
    }

    async fn update(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
        object: &DhcpProfile,
    ) -> nsx::Result<Reply<DhcpProfile>> {
        client.update_dhcp_profile(id, object).await
    }

    async fn delete(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
    ) -> nsx::Result<StatusCode> {
        client.delete_dhcp_profile(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::test_util::{FakeNsx, Kind, Op, test_spec};

    fn state_with_edge_cluster(id: &str) -> InfraState {
        let mut state = InfraState::default();
        state.dhcp.edge_cluster_id.set(id);
        state
    }

    #[tokio::test]
    async fn test_creates_profile_on_edge_cluster() {
        let nsx = FakeNsx::new();
        let spec = test_spec();
        let mut state = state_with_edge_cluster("ec-1");

        DhcpProfileTask::new().ensure(&nsx, &spec, &mut state).await.unwrap();

        let id = state.dhcp.profile_id.id().unwrap().to_string();
        let profile = nsx.profile(&id).unwrap();
        assert_eq!(profile.edge_cluster_id, "ec-1");
        assert_eq!(profile.display_name, spec.full_cluster_name());
        assert_eq!(profile.description, DESCRIPTION);
        assert_eq!(profile.tags, spec.common_tags());
    }

    #[tokio::test]
    async fn test_requires_edge_cluster() {
        let nsx = FakeNsx::new();
        let mut state = InfraState::default();

        let err = DhcpProfileTask::new()
            .ensure(&nsx, &test_spec(), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::MissingDependency(_)));
        assert_eq!(nsx.writes(), 0);
    }

    #[tokio::test]
    async fn test_moves_profile_to_new_edge_cluster() {
        let nsx = FakeNsx::new();
        let spec = test_spec();
        let task = DhcpProfileTask::new();
        let mut state = state_with_edge_cluster("ec-1");
        task.ensure(&nsx, &spec, &mut state).await.unwrap();

        state.dhcp.edge_cluster_id.clear();
        state.dhcp.edge_cluster_id.set("ec-2");
        task.ensure(&nsx, &spec, &mut state).await.unwrap();

        let profile = nsx.profile(state.dhcp.profile_id.id().unwrap()).unwrap();
        assert_eq!(profile.edge_cluster_id, "ec-2");
        assert_eq!(nsx.count(Kind::Profile, Op::Update), 1);
    }
}
