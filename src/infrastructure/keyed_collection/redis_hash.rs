//! Redis hash implementation of a keyed collection

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::domain::model_store::KeyedCollection;
use crate::domain::DomainError;

const BACKEND: &str = "redis";

/// Connection settings for a Redis keyed collection
#[derive(Clone)]
pub struct RedisCollectionConfig {
    pub host: String,
    pub port: u16,
    /// Empty means no AUTH
    pub password: String,
    pub db: i64,
}

impl fmt::Debug for RedisCollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCollectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("db", &self.db)
            .finish()
    }
}

impl Default for RedisCollectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisCollectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Parses a `host:port` connection string
    pub fn from_connection_string(connection: &str) -> Result<Self, DomainError> {
        let (host, port) = connection.rsplit_once(':').ok_or_else(|| {
            DomainError::configuration(format!(
                "Redis connection string '{}' must be host:port",
                connection
            ))
        })?;
        let port = port.parse::<u16>().map_err(|e| {
            DomainError::configuration(format!("Invalid Redis port '{}': {}", port, e))
        })?;

        Ok(Self::new(host, port))
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Structured connection info; the password is never spliced into a URL
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: (!self.password.is_empty()).then(|| self.password.clone()),
                ..Default::default()
            },
        }
    }
}

/// Keyed collection over Redis hashes (`HKEYS`, `HGET`, `HSET`, `HSETNX`)
#[derive(Clone)]
pub struct RedisKeyedCollection {
    connection: ConnectionManager,
    config: RedisCollectionConfig,
}

impl fmt::Debug for RedisKeyedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisKeyedCollection")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisKeyedCollection {
    pub async fn connect(config: RedisCollectionConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.connection_info()).map_err(|e| {
            DomainError::backend(BACKEND, format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            DomainError::backend(BACKEND, format!("Failed to connect to Redis: {}", e))
        })?;

        Ok(Self { connection, config })
    }
}

#[async_trait]
impl KeyedCollection for RedisKeyedCollection {
    async fn field_names(&self, key: &str) -> Result<Vec<String>, DomainError> {
        let mut conn = self.connection.clone();

        conn.hkeys(key).await.map_err(|e| {
            DomainError::backend(BACKEND, format!("Failed to list fields of '{}': {}", key, e))
        })
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, DomainError> {
        let mut conn = self.connection.clone();

        let value: Option<Vec<u8>> = conn.hget(key, field).await.map_err(|e| {
            DomainError::backend(
                BACKEND,
                format!("Failed to get field '{}' of '{}': {}", field, key, e),
            )
        })?;

        Ok(value.map(Bytes::from))
    }

    async fn set_field(&self, key: &str, field: &str, value: Bytes) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let _: i64 = conn.hset(key, field, value.as_ref()).await.map_err(|e| {
            DomainError::backend(
                BACKEND,
                format!("Failed to set field '{}' of '{}': {}", field, key, e),
            )
        })?;

        Ok(())
    }

    async fn set_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: Bytes,
    ) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        // HSETNX returns 1 if the field was created, 0 if it already existed
        conn.hset_nx(key, field, value.as_ref()).await.map_err(|e| {
            DomainError::backend(
                BACKEND,
                format!("Failed to set_nx field '{}' of '{}': {}", field, key, e),
            )
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
