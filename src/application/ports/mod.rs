pub mod remote_gateway;
pub mod snapshot_store;

pub use remote_gateway::RemoteGateway;
pub use snapshot_store::{LocalSnapshot, SnapshotStore};
