//! Runs the DHCP tasks in dependency order.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::EnsureError;
use crate::nsx::NsxClient;
use crate::spec::InfraSpec;
use crate::state::InfraState;
use crate::tasks::{
    DhcpIpPoolTask, DhcpPortTask, DhcpProfileTask, DhcpServerTask, EdgeClusterLookupTask,
    LogicalSwitchLookupTask, Task,
};

/// Converges or tears down the DHCP topology of one worker subnet.
///
/// Tasks run one after another. The first failure stops the pass; references
/// recorded before it stay in the state so the next pass resumes from there.
pub struct Ensurer {
    client: Arc<dyn NsxClient>,
    tasks: Vec<Box<dyn Task>>,
}

impl Ensurer {
    pub fn new(client: Arc<dyn NsxClient>) -> Self {
        let tasks: Vec<Box<dyn Task>> = vec![
            Box::new(EdgeClusterLookupTask::new()),
            Box::new(DhcpProfileTask::new()),
            Box::new(DhcpServerTask::new()),
            Box::new(LogicalSwitchLookupTask::new()),
            Box::new(DhcpPortTask::new()),
            Box::new(DhcpIpPoolTask::new()),
        ];
        Self { client, tasks }
    }

    /// Task labels in forward order.
    pub fn task_labels(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.label()).collect()
    }

    /// Create or update every object until it matches `spec`.
    pub async fn ensure_all(
        &self,
        spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<(), EnsureError> {
        for task in &self.tasks {
            let label = task.label();
            match task.name(spec) {
                Some(name) => debug!(task = label, name, "Ensuring"),
                None => debug!(task = label, "Ensuring"),
            }
            task.ensure(self.client.as_ref(), spec, state)
                .await
                .map_err(|source| EnsureError {
                    task: label,
                    source,
                })?;
            debug!(task = label, id = ?task.reference(state).id(), "Ensured");
        }
        Ok(())
    }

    /// Delete every owned object, dependents first.
    ///
    /// Returns whether anything was deleted in this pass.
    pub async fn ensure_all_deleted(
        &self,
        spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<bool, EnsureError> {
        let mut deleted = false;
        for task in self.tasks.iter().rev() {
            let Some(deletable) = task.deletable() else {
                continue;
            };
            let label = task.label();
            let removed = deletable
                .ensure_deleted(self.client.as_ref(), spec, state)
                .await
                .map_err(|source| EnsureError {
                    task: label,
                    source,
                })?;
            if removed {
                info!(task = label, "Deleted");
                deleted = true;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeNsx;

    #[test]
    fn test_task_order() {
        let ensurer = Ensurer::new(Arc::new(FakeNsx::new()));
        assert_eq!(
            ensurer.task_labels(),
            vec![
                "edge cluster lookup",
                "DHCP profile",
                "DHCP server",
                "logical switch lookup",
                "DHCP port",
                "DHCP IP pool",
            ]
        );
    }

    #[test]
    fn test_lookups_are_not_deletable() {
        let ensurer = Ensurer::new(Arc::new(FakeNsx::new()));
        let deletable: Vec<_> = ensurer
            .tasks
            .iter()
            .filter(|t| t.deletable().is_some())
            .map(|t| t.label())
            .collect();
        assert_eq!(
            deletable,
            vec!["DHCP profile", "DHCP server", "DHCP port", "DHCP IP pool"]
        );
    }
}
