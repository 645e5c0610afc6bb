//! Logical switch lookup by correlation tag.
//!
//! The manager API has no link from a policy segment to its logical switch, but
//! realized switches carry a tag holding the segment's policy path.

use async_trait::async_trait;

use super::{Result, Task, TaskMeta, bind};
use crate::error::{Operation, TaskError, expect_status};
use crate::nsx::{NsxClient, StatusCode};
use crate::spec::InfraSpec;
use crate::state::{InfraState, Reference};

/// Tag scope holding the policy path of the segment a switch realizes.
pub const SEGMENT_PATH_SCOPE: &str = "policyPath";

pub struct LogicalSwitchLookupTask {
    meta: TaskMeta,
}

impl LogicalSwitchLookupTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("logical switch lookup"),
        }
    }
}

impl Default for LogicalSwitchLookupTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for LogicalSwitchLookupTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn reference<'s>(&self, state: &'s InfraState) -> &'s Reference {
        &state.dhcp.logical_switch_id
    }

    async fn ensure(
        &self,
        client: &dyn NsxClient,
        _spec: &InfraSpec,
        state: &mut InfraState,
    ) -> Result<()> {
        let path = state
            .segment_path
            .clone()
            .ok_or(TaskError::MissingDependency("segment path"))?;

        let reply = client
            .list_logical_switches()
            .await
            .map_err(TaskError::Listing)?;
        expect_status(Operation::Listing, reply.status, StatusCode::OK)?;

        let id = reply
            .value
            .into_iter()
            .find_map(|switch| {
                let tagged = switch
                    .tags
                    .iter()
                    .any(|t| t.scope == SEGMENT_PATH_SCOPE && t.tag == path);
                tagged.then_some(switch.id).flatten()
            })
            .ok_or_else(|| TaskError::LookupNotFound(format!("logical switch for segment {}", path)))?;

        bind(self.label(), &mut state.dhcp.logical_switch_id, id);
        Ok(())
    }
}
