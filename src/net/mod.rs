//! Cross-server coordination: shared store records and the pub/sub channel

pub mod coordinator;
pub mod listener;
pub mod protocol;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;
