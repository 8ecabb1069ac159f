pub mod entities;
pub mod value_objects;

pub use entities::{Guest, GuestDraft, PendingChange, Roster};
pub use value_objects::{ConnectivityState, EngineState, GuestId, SyncPolicy, TableNumber};
