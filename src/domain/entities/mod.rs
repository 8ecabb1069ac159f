pub mod guest;
pub mod pending_change;
pub mod roster;

pub use guest::{Guest, GuestDraft};
pub use pending_change::{ChangeAction, PendingChange};
pub use roster::{
    AttendanceStats, PresenceFilter, Roster, RosterFilter, TableGroup, TableStats,
};
