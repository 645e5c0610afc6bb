//! Persisted references to remote objects.

use serde::{Deserialize, Serialize};

/// Optional id of a remote object.
///
/// `None` means "not created yet" or "gone". An empty string is a valid id.
/// A reference only moves `None -> Some` or `Some -> None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(Option<String>);

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Record a new id. The reference must be empty.
    pub fn set(&mut self, id: impl Into<String>) {
        debug_assert!(self.0.is_none(), "reference already holds {:?}", self.0);
        self.0 = Some(id.into());
    }

    /// Forget the id, returning it.
    pub fn clear(&mut self) -> Option<String> {
        self.0.take()
    }
}

impl From<Option<String>> for Reference {
    fn from(id: Option<String>) -> Self {
        Self(id)
    }
}

/// References to the DHCP objects, owned or looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpState {
    #[serde(default)]
    pub edge_cluster_id: Reference,
    #[serde(default)]
    pub profile_id: Reference,
    #[serde(default)]
    pub server_id: Reference,
    #[serde(default)]
    pub logical_switch_id: Reference,
    #[serde(default)]
    pub port_id: Reference,
    #[serde(default)]
    pub ip_pool_id: Reference,
}

/// State round-tripped by the caller between passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraState {
    /// Policy path of the worker network segment, provisioned outside this crate.
    /// Used to find the segment's logical switch by tag.
    #[serde(default)]
    pub segment_path: Option<String>,
    #[serde(default)]
    pub dhcp: DhcpState,
}

impl InfraState {
    /// True if no owned DHCP object is referenced anymore. Lookup references
    /// (edge cluster, logical switch) are not considered.
    pub fn owns_nothing(&self) -> bool {
        let d = &self.dhcp;
        !(d.profile_id.is_set() || d.server_id.is_set() || d.port_id.is_set() || d.ip_pool_id.is_set())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_lifecycle() {
        let mut r = Reference::default();
        assert!(!r.is_set());
        r.set("abc");
        assert_eq!(r.id(), Some("abc"));
        assert_eq!(r.clear(), Some("abc".to_string()));
        assert_eq!(r.id(), None);
    }

    #[test]
    fn test_empty_string_is_a_valid_id() {
        let r = Reference::new("");
        assert!(r.is_set());
        assert_eq!(r.id(), Some(""));
    }

    #[test]
    fn test_state_json_shape() {
        let mut state = InfraState::default();
        state.dhcp.server_id.set("srv-1");

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["dhcp"]["server_id"], "srv-1");
        assert!(value["dhcp"]["profile_id"].is_null());
        assert!(value["segment_path"].is_null());

        let empty: InfraState = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, InfraState::default());
        assert!(empty.owns_nothing());
        assert!(!state.owns_nothing());
    }
}
