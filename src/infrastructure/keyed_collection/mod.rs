//! Keyed collection infrastructure - Redis and in-memory hashes

mod in_memory;
mod redis_hash;

pub use in_memory::InMemoryKeyedCollection;
pub use redis_hash::{RedisCollectionConfig, RedisKeyedCollection};
