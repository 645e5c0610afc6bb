//! Edge cluster lookup by display name.

use async_trait::async_trait;

use super::{Result, Task, TaskMeta, bind};
use crate::error::{Operation, TaskError, expect_status};
use crate::nsx::{NsxClient, StatusCode};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};

pub struct EdgeClusterLookupTask {
    meta: TaskMeta,
}

impl EdgeClusterLookupTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("edge cluster lookup"),
        }
    }
}

impl Default for EdgeClusterLookupTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for EdgeClusterLookupTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn name<'a>(&self, spec: &'a InfraSpec) -> Option<&'a str> {
        Some(&spec.edge_cluster_name)
    }

    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference {
        &state.dhcp.edge_cluster_id
    }

    async fn ensure(
        &self,
        client: &dyn NsxClient,
        spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<()> {
        let name = &spec.edge_cluster_name;
        let reply = client
            .list_edge_clusters()
            .await
            .map_err(TaskError::Listing)?;
        expect_status(Operation::Listing, reply.status, StatusCode::OK)?;

        let id = reply
            .value
            .into_iter()
            .find_map(|cluster| {
                (&cluster.display_name == name)
                    .then_some(cluster.id)
                    .flatten()
            })
            .ok_or_else(|| TaskError::LookupNotFound(format!("edge cluster {}", name)))?;

        bind(self.label(), &mut state.dhcp.edge_cluster_id, id);
        Ok(())
    }
}
