//! In-memory NSX-T backend for tests.
//!
//! [`FakeNsx`] keeps every object in memory, records each client call and can
//! be told to fail specific calls. Deleting an object that is still referenced
//! fails with HTTP 400 the way the manager API does.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::nsx::{
    ClientError, DhcpIpPool, DhcpProfile, EdgeCluster, LogicalDhcpServer, LogicalPort,
    LogicalSwitch, NsxClient, Reply, Result, StatusCode, Tag,
};
use crate::spec::{ClusterTags, InfraSpec};
use crate::state::InfraState;
use crate::tasks::SEGMENT_PATH_SCOPE;

/// Policy path of the segment [`FakeNsx::seeded`] provides a switch for.
pub const TEST_SEGMENT_PATH: &str = "/infra/segments/garden--shoot";
/// Edge cluster name used by [`test_spec`].
pub const TEST_EDGE_CLUSTER: &str = "edge-1";

/// Resource kind of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    EdgeCluster,
    Switch,
    Profile,
    Server,
    Port,
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Op {
    fn is_write(self) -> bool {
        matches!(self, Op::Create | Op::Update | Op::Delete)
    }
}

/// One client call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: Kind,
    pub op: Op,
    pub id: Option<String>,
    /// Only meaningful for port deletes.
    pub detach: bool,
}

/// Injected failure for a `(Kind, Op)` pair. Stays active until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail the call with this HTTP status.
    Status(StatusCode),
    /// Perform the call but answer with this status instead of the usual one.
    Reply(StatusCode),
}

trait Identified {
    fn set_id(&mut self, id: String);
}

macro_rules! identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }
        })*
    };
}

identified!(DhcpProfile, LogicalDhcpServer, LogicalPort, DhcpIpPool);

#[derive(Default)]
struct Inner {
    edge_clusters: Vec<EdgeCluster>,
    switches: Vec<LogicalSwitch>,
    profiles: BTreeMap<String, DhcpProfile>,
    servers: BTreeMap<String, LogicalDhcpServer>,
    ports: BTreeMap<String, LogicalPort>,
    /// Pool id -> (server id, pool).
    pools: BTreeMap<String, (String, DhcpIpPool)>,
    calls: Vec<Call>,
    faults: HashMap<(Kind, Op), Fault>,
}

impl Inner {
    /// Log the call and apply any injected fault. `Ok(Some(status))` overrides
    /// the status of an otherwise normal reply.
    fn record(
        &mut self,
        kind: Kind,
        op: Op,
        id: Option<&str>,
        detach: bool,
    ) -> Result<Option<StatusCode>> {
        self.calls.push(Call {
            kind,
            op,
            id: id.map(str::to_owned),
            detach,
        });
        match self.faults.get(&(kind, op)) {
            Some(Fault::Status(status)) => Err(status_error(*status, "injected fault")),
            Some(Fault::Reply(status)) => Ok(Some(*status)),
            None => Ok(None),
        }
    }

    fn server_in_use(&self, id: &str) -> bool {
        self.pools.values().any(|(server_id, _)| server_id == id)
            || self.ports.values().any(|p| {
                p.attachment
                    .as_ref()
                    .is_some_and(|attachment| attachment.id == id)
            })
    }
}

fn status_error(status: StatusCode, body: &str) -> ClientError {
    if status == StatusCode::NOT_FOUND {
        ClientError::NotFound
    } else {
        ClientError::Status {
            status,
            body: body.to_string(),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn read_from<T: Clone>(map: &BTreeMap<String, T>, id: &str) -> Result<T> {
    map.get(id).cloned().ok_or(ClientError::NotFound)
}

fn create_in<T: Clone + Identified>(
    map: &mut BTreeMap<String, T>,
    object: &T,
    status: Option<StatusCode>,
) -> Reply<T> {
    let id = new_id();
    let mut object = object.clone();
    object.set_id(id.clone());
    map.insert(id, object.clone());
    Reply::new(status.unwrap_or(StatusCode::CREATED), object)
}

fn update_in<T: Clone + Identified>(
    map: &mut BTreeMap<String, T>,
    id: &str,
    object: &T,
    status: Option<StatusCode>,
) -> Result<Reply<T>> {
    let slot = map.get_mut(id).ok_or(ClientError::NotFound)?;
    let mut object = object.clone();
    object.set_id(id.to_string());
    *slot = object.clone();
    Ok(Reply::new(status.unwrap_or(StatusCode::OK), object))
}

/// In-memory NSX-T Manager.
#[derive(Clone, Default)]
pub struct FakeNsx {
    inner: Arc<Mutex<Inner>>,
}

impl FakeNsx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake with the edge cluster of [`test_spec`] and a switch realizing
    /// [`TEST_SEGMENT_PATH`].
    pub fn seeded() -> Self {
        let nsx = Self::new();
        nsx.add_edge_cluster(TEST_EDGE_CLUSTER);
        nsx.add_segment_switch(TEST_SEGMENT_PATH);
        nsx
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_edge_cluster(&self, name: &str) -> String {
        let id = new_id();
        self.insert_edge_cluster(EdgeCluster {
            id: Some(id.clone()),
            display_name: name.to_string(),
        });
        id
    }

    /// Append an edge cluster exactly as given, including a missing id.
    pub fn insert_edge_cluster(&self, cluster: EdgeCluster) {
        self.lock().edge_clusters.push(cluster);
    }

    pub fn add_logical_switch(&self, name: &str, tags: Vec<Tag>) -> String {
        let id = new_id();
        self.insert_logical_switch(LogicalSwitch {
            id: Some(id.clone()),
            display_name: name.to_string(),
            tags,
        });
        id
    }

    /// Append a logical switch exactly as given, including a missing id.
    pub fn insert_logical_switch(&self, switch: LogicalSwitch) {
        self.lock().switches.push(switch);
    }

    /// Switch tagged the way the policy layer tags a realized segment.
    pub fn add_segment_switch(&self, path: &str) -> String {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.add_logical_switch(name, vec![Tag::new(SEGMENT_PATH_SCOPE, path)])
    }

    /// Server created out of band, without recording a call.
    pub fn seed_server(&self, profile_id: &str) -> String {
        let id = new_id();
        self.lock().servers.insert(
            id.clone(),
            LogicalDhcpServer {
                id: Some(id.clone()),
                dhcp_profile_id: profile_id.to_string(),
                ..Default::default()
            },
        );
        id
    }

    /// Delete an object out of band, bypassing integrity checks.
    pub fn remove(&self, kind: Kind, id: &str) -> bool {
        let mut inner = self.lock();
        match kind {
            Kind::EdgeCluster => {
                let before = inner.edge_clusters.len();
                inner.edge_clusters.retain(|c| c.id.as_deref() != Some(id));
                inner.edge_clusters.len() != before
            }
            Kind::Switch => {
                let before = inner.switches.len();
                inner.switches.retain(|s| s.id.as_deref() != Some(id));
                inner.switches.len() != before
            }
            Kind::Profile => inner.profiles.remove(id).is_some(),
            Kind::Server => inner.servers.remove(id).is_some(),
            Kind::Port => inner.ports.remove(id).is_some(),
            Kind::Pool => inner.pools.remove(id).is_some(),
        }
    }

    pub fn profile(&self, id: &str) -> Option<DhcpProfile> {
        self.lock().profiles.get(id).cloned()
    }

    pub fn server(&self, id: &str) -> Option<LogicalDhcpServer> {
        self.lock().servers.get(id).cloned()
    }

    pub fn port(&self, id: &str) -> Option<LogicalPort> {
        self.lock().ports.get(id).cloned()
    }

    pub fn pool(&self, id: &str) -> Option<DhcpIpPool> {
        self.lock().pools.get(id).map(|(_, pool)| pool.clone())
    }

    pub fn edit_server(&self, id: &str, f: impl FnOnce(&mut LogicalDhcpServer)) {
        if let Some(server) = self.lock().servers.get_mut(id) {
            f(server);
        }
    }

    pub fn edit_port(&self, id: &str, f: impl FnOnce(&mut LogicalPort)) {
        if let Some(port) = self.lock().ports.get_mut(id) {
            f(port);
        }
    }

    pub fn edit_pool(&self, id: &str, f: impl FnOnce(&mut DhcpIpPool)) {
        if let Some((_, pool)) = self.lock().pools.get_mut(id) {
            f(pool);
        }
    }

    /// Number of owned objects of all kinds.
    pub fn owned_objects(&self) -> usize {
        let inner = self.lock();
        inner.profiles.len() + inner.servers.len() + inner.ports.len() + inner.pools.len()
    }

    pub fn inject(&self, kind: Kind, op: Op, fault: Fault) {
        self.lock().faults.insert((kind, op), fault);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, kind: Kind, op: Op) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind && c.op == op)
            .count()
    }

    /// Number of create, update and delete calls.
    pub fn writes(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.op.is_write()).count()
    }
}

#[async_trait]
impl NsxClient for FakeNsx {
    async fn list_edge_clusters(&self) -> Result<Reply<Vec<EdgeCluster>>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::EdgeCluster, Op::List, None, false)?;
        Ok(Reply::new(
            status.unwrap_or(StatusCode::OK),
            inner.edge_clusters.clone(),
        ))
    }

    async fn read_dhcp_profile(&self, id: &str) -> Result<Reply<DhcpProfile>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Profile, Op::Read, Some(id), false)?;
        let profile = read_from(&inner.profiles, id)?;
        Ok(Reply::new(status.unwrap_or(StatusCode::OK), profile))
    }

    async fn create_dhcp_profile(&self, profile: &DhcpProfile) -> Result<Reply<DhcpProfile>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Profile, Op::Create, None, false)?;
        Ok(create_in(&mut inner.profiles, profile, status))
    }

    async fn update_dhcp_profile(
        &self,
        id: &str,
        profile: &DhcpProfile,
    ) -> Result<Reply<DhcpProfile>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Profile, Op::Update, Some(id), false)?;
        update_in(&mut inner.profiles, id, profile, status)
    }

    async fn delete_dhcp_profile(&self, id: &str) -> Result<StatusCode> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Profile, Op::Delete, Some(id), false)?;
        if !inner.profiles.contains_key(id) {
            return Err(ClientError::NotFound);
        }
        if inner.servers.values().any(|s| s.dhcp_profile_id == id) {
            return Err(status_error(StatusCode::BAD_REQUEST, "profile in use"));
        }
        inner.profiles.remove(id);
        Ok(status.unwrap_or(StatusCode::OK))
    }

    async fn read_dhcp_server(&self, id: &str) -> Result<Reply<LogicalDhcpServer>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Server, Op::Read, Some(id), false)?;
        let server = read_from(&inner.servers, id)?;
        Ok(Reply::new(status.unwrap_or(StatusCode::OK), server))
    }

    async fn create_dhcp_server(
        &self,
        server: &LogicalDhcpServer,
    ) -> Result<Reply<LogicalDhcpServer>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Server, Op::Create, None, false)?;
        Ok(create_in(&mut inner.servers, server, status))
    }

    async fn update_dhcp_server(
        &self,
        id: &str,
        server: &LogicalDhcpServer,
    ) -> Result<Reply<LogicalDhcpServer>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Server, Op::Update, Some(id), false)?;
        update_in(&mut inner.servers, id, server, status)
    }

    async fn delete_dhcp_server(&self, id: &str) -> Result<StatusCode> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Server, Op::Delete, Some(id), false)?;
        if !inner.servers.contains_key(id) {
            return Err(ClientError::NotFound);
        }
        if inner.server_in_use(id) {
            return Err(status_error(StatusCode::BAD_REQUEST, "server in use"));
        }
        inner.servers.remove(id);
        Ok(status.unwrap_or(StatusCode::OK))
    }

    async fn list_logical_switches(&self) -> Result<Reply<Vec<LogicalSwitch>>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Switch, Op::List, None, false)?;
        Ok(Reply::new(
            status.unwrap_or(StatusCode::OK),
            inner.switches.clone(),
        ))
    }

    async fn read_logical_port(&self, id: &str) -> Result<Reply<LogicalPort>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Port, Op::Read, Some(id), false)?;
        let port = read_from(&inner.ports, id)?;
        Ok(Reply::new(status.unwrap_or(StatusCode::OK), port))
    }

    async fn create_logical_port(&self, port: &LogicalPort) -> Result<Reply<LogicalPort>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Port, Op::Create, None, false)?;
        Ok(create_in(&mut inner.ports, port, status))
    }

    async fn update_logical_port(
        &self,
        id: &str,
        port: &LogicalPort,
    ) -> Result<Reply<LogicalPort>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Port, Op::Update, Some(id), false)?;
        update_in(&mut inner.ports, id, port, status)
    }

    async fn delete_logical_port(&self, id: &str, detach: bool) -> Result<StatusCode> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Port, Op::Delete, Some(id), detach)?;
        let attached = match inner.ports.get(id) {
            Some(port) => port.attachment.is_some(),
            None => return Err(ClientError::NotFound),
        };
        if attached && !detach {
            return Err(status_error(StatusCode::BAD_REQUEST, "port has an attachment"));
        }
        inner.ports.remove(id);
        Ok(status.unwrap_or(StatusCode::OK))
    }

    async fn read_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<Reply<DhcpIpPool>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Pool, Op::Read, Some(id), false)?;
        match inner.pools.get(id) {
            Some((owner, pool)) if owner == server_id => {
                Ok(Reply::new(status.unwrap_or(StatusCode::OK), pool.clone()))
            }
            _ => Err(ClientError::NotFound),
        }
    }

    async fn create_dhcp_ip_pool(
        &self,
        server_id: &str,
        pool: &DhcpIpPool,
    ) -> Result<Reply<DhcpIpPool>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Pool, Op::Create, None, false)?;
        if !inner.servers.contains_key(server_id) {
            return Err(ClientError::NotFound);
        }
        let id = new_id();
        let mut pool = pool.clone();
        pool.set_id(id.clone());
        inner
            .pools
            .insert(id, (server_id.to_string(), pool.clone()));
        Ok(Reply::new(status.unwrap_or(StatusCode::CREATED), pool))
    }

    async fn update_dhcp_ip_pool(
        &self,
        server_id: &str,
        id: &str,
        pool: &DhcpIpPool,
    ) -> Result<Reply<DhcpIpPool>> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Pool, Op::Update, Some(id), false)?;
        match inner.pools.get_mut(id) {
            Some((owner, slot)) if owner == server_id => {
                let mut pool = pool.clone();
                pool.set_id(id.to_string());
                *slot = pool.clone();
                Ok(Reply::new(status.unwrap_or(StatusCode::OK), pool))
            }
            _ => Err(ClientError::NotFound),
        }
    }

    async fn delete_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<StatusCode> {
        let mut inner = self.lock();
        let status = inner.record(Kind::Pool, Op::Delete, Some(id), false)?;
        let owned = inner
            .pools
            .get(id)
            .is_some_and(|(owner, _)| owner == server_id);
        if !owned {
            return Err(ClientError::NotFound);
        }
        inner.pools.remove(id);
        Ok(status.unwrap_or(StatusCode::OK))
    }
}

/// Spec for `garden--shoot` on `10.0.0.0/24`.
pub fn test_spec() -> InfraSpec {
    InfraSpec {
        cluster_name: "shoot".to_string(),
        name_prefix: Some("garden".to_string()),
        worker_network: "10.0.0.0/24".to_string(),
        dns_servers: vec!["10.0.0.53".to_string(), "8.8.8.8".to_string()],
        edge_cluster_name: TEST_EDGE_CLUSTER.to_string(),
        tags: Arc::new(ClusterTags::new("nsxt-dhcp", "garden--shoot")),
    }
}

/// Fresh state pointing at [`TEST_SEGMENT_PATH`].
pub fn test_state() -> InfraState {
    InfraState {
        segment_path: Some(TEST_SEGMENT_PATH.to_string()),
        ..Default::default()
    }
}
