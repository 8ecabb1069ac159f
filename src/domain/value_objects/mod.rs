pub mod change_id;
pub mod connectivity;
pub mod guest_id;
pub mod sync_policy;
pub mod table_number;

pub use change_id::ChangeId;
pub use connectivity::{ConnectivityState, EngineState};
pub use guest_id::GuestId;
pub use sync_policy::{LoadFallback, PresencePolicy, RemoteFailurePolicy, SyncPolicy};
pub use table_number::TableNumber;
