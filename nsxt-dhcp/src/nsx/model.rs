//! NSX-T Manager API objects, limited to the fields this crate manages.

use serde::{Deserialize, Serialize};

/// Attachment type of a logical port bound to a DHCP server.
pub const ATTACHMENT_DHCP_SERVICE: &str = "DHCP_SERVICE";
/// Administrative state of an enabled logical port.
pub const ADMIN_STATE_UP: &str = "UP";

/// Free-form tag attached to NSX-T objects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub scope: String,
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

/// Paged list response: `{"results": [...], "cursor": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeCluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub edge_cluster_id: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ipv4DhcpServer {
    /// Server address with prefix length, e.g. `10.0.0.2/24`.
    #[serde(default)]
    pub dhcp_server_ip: String,
    #[serde(default)]
    pub gateway_ip: String,
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalDhcpServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dhcp_profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_dhcp_server: Option<Ipv4DhcpServer>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalSwitch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalPortAttachment {
    #[serde(default)]
    pub attachment_type: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logical_switch_id: String,
    #[serde(default)]
    pub admin_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<LogicalPortAttachment>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPoolRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpIpPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub gateway_ip: String,
    /// Lease time in seconds.
    #[serde(default)]
    pub lease_time: i64,
    /// Pool usage percentage that raises an error alarm.
    #[serde(default)]
    pub error_threshold: i64,
    /// Pool usage percentage that raises a warning alarm.
    #[serde(default)]
    pub warning_threshold: i64,
    #[serde(default)]
    pub allocation_ranges: Vec<IpPoolRange>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_result_decodes_nsx_payload() {
        let json = r#"{
            "result_count": 2,
            "cursor": "0042",
            "results": [
                {"id": "ls-1", "display_name": "a", "tags": [{"scope": "policyPath", "tag": "/infra/segments/a"}]},
                {"id": "ls-2", "display_name": "b", "_revision": 3}
            ]
        }"#;
        let list: ListResult<LogicalSwitch> = serde_json::from_str(json).unwrap();
        assert_eq!(list.cursor.as_deref(), Some("0042"));
        assert_eq!(list.results.len(), 2);
        assert_eq!(list.results[0].tags[0].scope, "policyPath");
        assert!(list.results[1].tags.is_empty());
    }

    #[test]
    fn test_new_objects_serialize_without_id() {
        let profile = DhcpProfile {
            display_name: "shoot".to_string(),
            edge_cluster_id: "ec-1".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["edge_cluster_id"], "ec-1");
    }
}
