//! Convergent provisioning of an NSX-T DHCP topology for one worker subnet.
//!
//! An [`Ensurer`] runs a fixed list of tasks against an [`NsxClient`]:
//! edge cluster lookup, DHCP profile, DHCP server, logical switch lookup,
//! DHCP port and DHCP IP pool. Each pass reads the desired [`InfraSpec`] and
//! records the ids of remote objects in an [`InfraState`] the caller persists
//! between passes.

pub mod address;
pub mod config;
pub mod ensurer;
pub mod error;
pub mod nsx;
pub mod spec;
pub mod state;
pub mod tasks;
pub mod test_util;

pub use ensurer::Ensurer;
pub use error::{EnsureError, TaskError};
pub use nsx::{HttpNsxClient, NsxClient};
pub use spec::InfraSpec;
pub use state::{InfraState, Reference};
