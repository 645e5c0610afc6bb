//! Convergence tasks, one per NSX-T resource kind.
//!
//! Lookup tasks only discover objects provisioned elsewhere. Owning tasks create,
//! update and delete their object through the shared [`converge`] and [`remove`]
//! state machine.

pub mod diff;
mod edge_cluster;
mod ip_pool;
mod logical_switch;
mod port;
mod profile;
mod server;

pub use edge_cluster::EdgeClusterLookupTask;
pub use ip_pool::DhcpIpPoolTask;
pub use logical_switch::{LogicalSwitchLookupTask, SEGMENT_PATH_SCOPE};
pub use port::DhcpPortTask;
pub use profile::DhcpProfileTask;
pub use server::DhcpServerTask;

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{Operation, TaskError, expect_status};
use crate::nsx::{self, NsxClient, Reply, StatusCode};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};
use diff::FieldDiff;

/// Description stamped on every created object.
pub const DESCRIPTION: &str = "created by nsxt-dhcp";

pub type Result<T> = std::result::Result<T, TaskError>;

/// Metadata shared by all tasks.
#[derive(Debug, Clone, Copy)]
pub struct TaskMeta {
    label: &'static str,
}

impl TaskMeta {
    pub const fn new(label: &'static str) -> Self {
        Self { label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// One idempotent convergence step.
#[async_trait]
pub trait Task: Send + Sync {
    fn meta(&self) -> &TaskMeta;

    /// Human-readable label for logs and errors.
    fn label(&self) -> &'static str {
        self.meta().label()
    }

    /// Name of the looked-up object, for tasks that search by name.
    fn name<'a>(&self, _spec: &'a InfraSpec) -> Option<&'a str> {
        None
    }

    /// The reference this task maintains.
    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference;

    async fn ensure(
        &self,
        client: &dyn NsxClient,
        spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<()>;

    /// `Some` for tasks that own (and may delete) their object.
    fn deletable(&self) -> Option<&dyn DeletableTask> {
        None
    }
}

/// Task that owns its remote object.
#[async_trait]
pub trait DeletableTask: Task {
    /// Delete the object. Returns `false` if there was nothing to delete.
    async fn ensure_deleted(
        &self,
        client: &dyn NsxClient,
        spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<bool>;
}

/// Per-kind operations behind the owning-task state machine.
#[async_trait]
pub(crate) trait OwnedResource: Task {
    type Object: fmt::Debug + Send + Sync;
    /// Parent ids needed to address the object (e.g. the server of a pool).
    type Scope: Send + Sync;

    fn slot<'s>(&self, state: &'s mut InfraState) -> &'s mut Reference;

    fn scope(&self, state: &InfraState) -> Result<Self::Scope>;

    /// Scope for deleting. `None` means the parent is gone and took the object
    /// with it.
    fn delete_scope(&self, state: &InfraState) -> Result<Option<Self::Scope>> {
        self.scope(state).map(Some)
    }

    /// Object as it should exist, built from `InfraSpec` and earlier references.
    fn desired(&self, spec: &InfraSpec, state: &InfraState) -> Result<Self::Object>;

    fn diff(&self, current: &Self::Object, desired: &Self::Object) -> FieldDiff;

    fn id_of(object: &Self::Object) -> Option<&str>;

    async fn read(
        &self,
        client: &dyn NsxClient,
        scope: &Self::Scope,
        id: &str,
    ) -> nsx::Result<Reply<Self::Object>>;

    async fn create(
        &self,
        client: &dyn NsxClient,
        scope: &Self::Scope,
        object: &Self::Object,
    ) -> nsx::Result<Reply<Self::Object>>;

    async fn update(
        &self,
        client: &dyn NsxClient,
        scope: &Self::Scope,
        id: &str,
        object: &Self::Object,
    ) -> nsx::Result<Reply<Self::Object>>;

    async fn delete(
        &self,
        client: &dyn NsxClient,
        scope: &Self::Scope,
        id: &str,
    ) -> nsx::Result<StatusCode>;
}

/// Id held by `reference`, or `MissingDependency` naming `what`.
pub(crate) fn require(reference: &Reference, what: &'static str) -> Result<String> {
    reference
        .id()
        .map(str::to_owned)
        .ok_or(TaskError::MissingDependency(what))
}

/// Create, update or recreate an owned object until it matches `InfraSpec`.
///
/// A stored id that reads as not found is forgotten and the object is created
/// once more; there is no further retry within the same call.
pub(crate) async fn converge<T: OwnedResource>(
    task: &T,
    client: &dyn NsxClient,
    spec: &InfraSpec,
    state: &mut InfraState,
) -> Result<()> {
    let scope = task.scope(state)?;
    let desired = task.desired(spec, state)?;

    if let Some(id) = task.slot(state).id().map(str::to_owned) {
        match task.read(client, &scope, &id).await {
            Ok(reply) => {
                let diff = task.diff(&reply.value, &desired);
                if diff.is_empty() {
                    debug!(task = task.label(), %id, "Up to date");
                    return Ok(());
                }
                info!(task = task.label(), %id, changed = ?diff.fields(), "Updating");
                let reply = task
                    .update(client, &scope, &id, &desired)
                    .await
                    .map_err(TaskError::Updating)?;
                return expect_status(Operation::Updating, reply.status, StatusCode::OK);
            }
            Err(e) if e.is_not_found() => {
                warn!(task = task.label(), %id, "Object disappeared, recreating");
                task.slot(state).clear();
            }
            Err(e) => return Err(TaskError::Reading(e)),
        }
    }

    let reply = task
        .create(client, &scope, &desired)
        .await
        .map_err(TaskError::Creating)?;
    expect_status(Operation::Creating, reply.status, StatusCode::CREATED)?;
    let id = T::id_of(&reply.value).ok_or(TaskError::MissingObjectId {
        operation: Operation::Creating,
    })?;
    info!(task = task.label(), %id, "Created");
    task.slot(state).set(id);
    Ok(())
}

/// Delete an owned object. Returns `false` if there was nothing to delete.
pub(crate) async fn remove<T: OwnedResource>(
    task: &T,
    client: &dyn NsxClient,
    state: &mut InfraState,
) -> Result<bool> {
    let Some(id) = task.slot(state).id().map(str::to_owned) else {
        return Ok(false);
    };
    let Some(scope) = task.delete_scope(state)? else {
        debug!(task = task.label(), %id, "Parent gone, forgetting");
        task.slot(state).clear();
        return Ok(false);
    };

    match task.delete(client, &scope, &id).await {
        Ok(status) if status.is_success() => {}
        Ok(status) => {
            return Err(TaskError::UnexpectedStatus {
                operation: Operation::Deleting,
                status,
            });
        }
        Err(e) if e.is_not_found() => {
            debug!(task = task.label(), %id, "Already gone");
            task.slot(state).clear();
            return Ok(false);
        }
        Err(e) => return Err(TaskError::Deleting(e)),
    }

    info!(task = task.label(), %id, "Deleted");
    task.slot(state).clear();
    Ok(true)
}

/// Point a lookup reference at `id`. A changed id is cleared first, so the
/// reference never switches identity in one step.
pub(crate) fn bind(label: &'static str, reference: &mut Reference, id: String) {
    if reference.id() == Some(id.as_str()) {
        return;
    }
    if let Some(previous) = reference.clear() {
        warn!(task = label, %previous, current = %id, "Lookup resolved to a different object");
    } else {
        debug!(task = label, %id, "Resolved");
    }
    reference.set(id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert_eq!(require(&Reference::new("x"), "x id").unwrap(), "x");
        assert!(matches!(
            require(&Reference::default(), "x id"),
            Err(TaskError::MissingDependency("x id"))
        ));
    }

    #[test]
    fn test_bind_replaces_through_none() {
        let mut r = Reference::default();
        bind("test", &mut r, "a".to_string());
        assert_eq!(r.id(), Some("a"));
        bind("test", &mut r, "a".to_string());
        assert_eq!(r.id(), Some("a"));
        bind("test", &mut r, "b".to_string());
        assert_eq!(r.id(), Some("b"));
    }
}
