pub mod application;
pub mod format;
pub mod storage;
