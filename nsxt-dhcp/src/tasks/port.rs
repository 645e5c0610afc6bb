//! Logical port attaching the DHCP server to the worker switch.

use async_trait::async_trait;

use super::diff::FieldDiff;
use super::{
    DESCRIPTION, DeletableTask, OwnedResource, Result, Task, TaskMeta, converge, remove, require,
};
use crate::nsx::{
    self, ADMIN_STATE_UP, ATTACHMENT_DHCP_SERVICE, LogicalPort, LogicalPortAttachment, NsxClient,
    Reply, StatusCode,
};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};

pub struct DhcpPortTask {
    meta: TaskMeta,
}

impl DhcpPortTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("DHCP port"),
        }
    }
}

impl Default for DhcpPortTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for DhcpPortTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference {
        &state.dhcp.port_id
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
impl DeletableTask for DhcpPortTask {
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
impl OwnedResource for DhcpPortTask {
    type Object = LogicalPort;
    type Scope = ();

    fn slot<'s>(&self, state: &'s mut InfraState) -> &'s mut Reference {
        &mut state.dhcp.port_id
    }

    fn scope(&self, _state: &InfraState) -> Result<()> {
        Ok(())
    }

    fn desired(&self, spec: &InfraSpec, state: &InfraState) -> Result<LogicalPort> {
        Ok(LogicalPort {
            id: None,
            display_name: spec.full_cluster_name(),
            description: DESCRIPTION.to_string(),
            logical_switch_id: require(&state.dhcp.logical_switch_id, "logical switch id")?,
            admin_state: ADMIN_STATE_UP.to_string(),
            attachment: Some(LogicalPortAttachment {
                attachment_type: ATTACHMENT_DHCP_SERVICE.to_string(),
                id: require(&state.dhcp.server_id, "DHCP server id")?,
            }),
            tags: spec.common_tags(),
        })
    }

    fn diff(&self, current: &LogicalPort, desired: &LogicalPort) -> FieldDiff {
        FieldDiff::new()
            .field("display_name", &current.display_name, &desired.display_name)
            .field(
                "logical_switch_id",
                &current.logical_switch_id,
                &desired.logical_switch_id,
            )
            .field("admin_state", &current.admin_state, &desired.admin_state)
            .field("attachment", &current.attachment, &desired.attachment)
            .tags(&current.tags, &desired.tags)
    }

    fn id_of(object: &LogicalPort) -> Option<&str> {
        object.id.as_deref()
    }

    async fn read(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
    ) -> nsx::Result<Reply<LogicalPort>> {
        client.read_logical_port(id).await
    }

    async fn create(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        object: &LogicalPort,
    ) -> nsx::Result<Reply<LogicalPort>> {
        client.create_logical_port(object).await
    }

    async fn update(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
        object: &LogicalPort,
    ) -> nsx::Result<Reply<LogicalPort>> {
        client.update_logical_port(id, object).await
    }

    async fn delete(
        &self,
        client: &dyn NsxClient,
        _scope: &(),
        id: &str,
    ) -> nsx::Result<StatusCode> {
        // The DHCP attachment would otherwise block the delete.
        client.delete_logical_port(id, true).await
    }
}
