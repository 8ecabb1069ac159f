pub mod database;
pub mod remote;
pub mod storage;
