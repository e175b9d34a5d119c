mod file;
mod memory;
mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use log::info;

use crate::cli::Args;
use crate::error::StoreError;

pub use self::file::FileKv;
pub use self::memory::MemoryKv;
pub use self::redis::RedisKv;

/// Flat string key-value store on the device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub fn create_key_value_store(args: &Args) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match args.kv_type.to_lowercase().as_str() {
        "file" => {
            info!("Device storage: JSON document at {}", args.kv_path);
            Ok(Arc::new(FileKv::new(&args.kv_path)))
        }
        "redis" => {
            info!("Device storage: redis at {} (prefix '{}')", args.kv_redis_url, args.kv_redis_prefix);
            Ok(Arc::new(RedisKv::new(&args.kv_redis_url, &args.kv_redis_prefix)?))
        }
        "memory" => {
            info!("Device storage: in-memory, nothing survives a restart");
            Ok(Arc::new(MemoryKv::new()))
        }
        other => Err(StoreError::Config(format!("Unsupported key-value store type: {}", other))),
    }
}
