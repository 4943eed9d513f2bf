//! Session store construction.
//!
//! The store backends live outside this crate. Validation only resolves the
//! store settings into a [`SessionStoreHandle`] through a [`SessionStoreFactory`],
//! so a host process can plug in its own factory.
//!
//! ```rust
//! use authgate::options::SessionOptions;
//! use authgate::session::{DefaultSessionStoreFactory, SessionStoreFactory, SessionStoreHandle};
//! use authgate::validation::cookie::validate_cookie;
//! use authgate::error::ValidationErrors;
//!
//! let mut errors = ValidationErrors::new();
//! let cookie = validate_cookie(&Default::default(), &mut errors);
//! let handle = DefaultSessionStoreFactory
//!     .build(&SessionOptions::default(), &cookie, None)
//!     .unwrap();
//! assert!(matches!(handle, SessionStoreHandle::Cookie(_)));
//! ```

use thiserror::Error;
use url::Url;

use crate::cipher::SymmetricCipher;
use crate::options::{RedisOptions, SessionOptions};
use crate::validation::cookie::CookieSettings;

/// Session store construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `session.type` is neither `cookie` nor `redis`.
    #[error("unknown session store type '{0}'")]
    UnknownType(String),

    /// Plain Redis without a connection URL.
    #[error("redis connection URL is required")]
    MissingConnectionUrl,

    /// Sentinel without a master name.
    #[error("redis sentinel master name is required")]
    MissingSentinelMaster,

    /// Sentinel or cluster mode without node URLs.
    #[error("redis {0} connection URLs are required")]
    MissingNodes(&'static str),

    /// A Redis URL does not parse.
    #[error("unable to parse redis url {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// How to reach Redis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisConnection {
    /// A single instance.
    Single(Url),
    /// A Sentinel-managed master.
    Sentinel {
        /// Master name.
        master_name: String,
        /// Sentinel nodes.
        urls: Vec<Url>,
    },
    /// A Redis Cluster.
    Cluster(Vec<Url>),
}

/// Resolved session store.
#[derive(Debug, Clone)]
pub enum SessionStoreHandle {
    /// Sessions stored in the cookie itself.
    Cookie(StoreSettings),
    /// Sessions stored in Redis, keyed by a ticket in the cookie.
    Redis {
        /// Cookie and cipher settings.
        settings: StoreSettings,
        /// Redis connection.
        connection: RedisConnection,
    },
}

impl SessionStoreHandle {
    /// Store type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cookie(_) => "cookie",
            Self::Redis { .. } => "redis",
        }
    }

    /// Cookie and cipher settings of either store.
    pub fn settings(&self) -> &StoreSettings {
        match self {
            Self::Cookie(settings) | Self::Redis { settings, .. } => settings,
        }
    }
}

/// Settings shared by every store.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Cookie policy.
    pub cookie: CookieSettings,
    /// Cookie cipher, when encryption is required.
    pub cipher: Option<SymmetricCipher>,
}

/// Builds a session store from validated settings.
pub trait SessionStoreFactory: Send + Sync {
    /// Build the store described by `opts`.
    fn build(
        &self,
        opts: &SessionOptions,
        cookie: &CookieSettings,
        cipher: Option<&SymmetricCipher>,
    ) -> Result<SessionStoreHandle, SessionError>;
}

/// Factory for the built-in `cookie` and `redis` stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSessionStoreFactory;

impl SessionStoreFactory for DefaultSessionStoreFactory {
    fn build(
        &self,
        opts: &SessionOptions,
        cookie: &CookieSettings,
        cipher: Option<&SymmetricCipher>,
    ) -> Result<SessionStoreHandle, SessionError> {
        let settings = StoreSettings {
            cookie: cookie.clone(),
            cipher: cipher.cloned(),
        };
        match opts.kind.as_str() {
            "cookie" => Ok(SessionStoreHandle::Cookie(settings)),
            "redis" => Ok(SessionStoreHandle::Redis {
                settings,
                connection: redis_connection(&opts.redis)?,
            }),
            other => Err(SessionError::UnknownType(other.to_string())),
        }
    }
}

fn redis_connection(opts: &RedisOptions) -> Result<RedisConnection, SessionError> {
    if opts.use_sentinel {
        if opts.sentinel_master_name.is_empty() {
            return Err(SessionError::MissingSentinelMaster);
        }
        return Ok(RedisConnection::Sentinel {
            master_name: opts.sentinel_master_name.clone(),
            urls: parse_nodes(&opts.sentinel_connection_urls, "sentinel")?,
        });
    }

    if opts.use_cluster {
        return Ok(RedisConnection::Cluster(parse_nodes(&opts.cluster_connection_urls, "cluster")?));
    }

    if opts.connection_url.is_empty() {
        return Err(SessionError::MissingConnectionUrl);
    }
    parse_redis_url(&opts.connection_url).map(RedisConnection::Single)
}

fn parse_nodes(urls: &[String], mode: &'static str) -> Result<Vec<Url>, SessionError> {
    if urls.is_empty() {
        return Err(SessionError::MissingNodes(mode));
    }
    urls.iter().map(|url| parse_redis_url(url)).collect()
}

fn parse_redis_url(url: &str) -> Result<Url, SessionError> {
    Url::parse(url).map_err(|err| SessionError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })
}
