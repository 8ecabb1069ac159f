pub mod sqlite_snapshot_store;

pub use sqlite_snapshot_store::SqliteSnapshotStore;
