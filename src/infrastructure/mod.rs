pub mod cache;
pub mod database;
pub mod jobs;
pub mod offline;
pub mod storage;
