//! Desired state of one worker subnet's DHCP topology.

use std::fmt;
use std::sync::Arc;

use crate::nsx::Tag;

/// Tag scope naming the owner of the created objects.
pub const OWNER_SCOPE: &str = "owner";
/// Tag scope naming the cluster the objects belong to.
pub const CLUSTER_SCOPE: &str = "cluster";

/// Produces the provenance tags stamped on every created object.
///
/// Must be deterministic: the same generator yields the same tag set on every
/// pass, otherwise every pass would issue updates.
pub trait TagGenerator: Send + Sync + fmt::Debug {
    fn tags(&self) -> Vec<Tag>;
}

/// Default generator: one owner tag plus one cluster tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTags {
    owner: String,
    cluster: String,
}

impl ClusterTags {
    pub fn new(owner: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            cluster: cluster.into(),
        }
    }
}

impl TagGenerator for ClusterTags {
    fn tags(&self) -> Vec<Tag> {
        vec![
            Tag::new(OWNER_SCOPE, &self.owner),
            Tag::new(CLUSTER_SCOPE, &self.cluster),
        ]
    }
}

/// Display name used for all created objects: `{prefix}--{cluster}` or just the cluster.
pub fn full_cluster_name(name_prefix: Option<&str>, cluster_name: &str) -> String {
    match name_prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}--{}", prefix, cluster_name),
        _ => cluster_name.to_string(),
    }
}

/// Input of a reconciliation pass. Never modified by the engine.
#[derive(Debug, Clone)]
pub struct InfraSpec {
    pub cluster_name: String,
    pub name_prefix: Option<String>,
    /// Worker subnet CIDR. Parsed when addresses are derived.
    pub worker_network: String,
    /// DNS servers announced by DHCP. Order is significant.
    pub dns_servers: Vec<String>,
    pub edge_cluster_name: String,
    pub tags: Arc<dyn TagGenerator>,
}

impl InfraSpec {
    pub fn full_cluster_name(&self) -> String {
        full_cluster_name(self.name_prefix.as_deref(), &self.cluster_name)
    }

    pub fn common_tags(&self) -> Vec<Tag> {
        self.tags.tags()
    }
}
