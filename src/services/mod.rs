pub mod error;
pub mod gateway;
pub mod staging;
pub mod storage;
pub mod worker;
