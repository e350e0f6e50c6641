//! Runtime configuration.
//!
//! Every knob has a default matching a stock image-serving deployment (queue
//! `image_queue`, batches of 32, quarter-second sleeps on both sides, 100
//! polling attempts, five minute result TTL). [`Config::from_env`] overrides
//! them from the process environment.
//!
//! | Variable            | Field              | Unit            |
//! |---------------------|--------------------|-----------------|
//! | `REDIS_URL`         | `redis_url`        | URL             |
//! | `REDIS_HOST`        | `redis_url`        | host (port 6379)|
//! | `IMAGE_QUEUE`       | `queue_name`       |                 |
//! | `BATCH_SIZE`        | `max_batch_size`   | items           |
//! | `SERVER_SLEEP`      | `idle_interval`    | seconds         |
//! | `CLIENT_SLEEP`      | `poll_interval`    | seconds         |
//! | `CLIENT_MAX_TRIES`  | `max_attempts`     | attempts        |
//! | `CLIENT_TIMEOUT`    | `await_timeout`    | seconds         |
//! | `RESULT_TTL`        | `result_ttl`       | seconds         |
//! | `CLAIM_MODE`        | `claim_mode`       | `atomic` / `read-then-trim` |
//! | `RESULT_KEY_PREFIX` | `result_key_prefix`|                 |
//!
//! `REDIS_URL` wins over `REDIS_HOST` when both are set.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::broker::Broker;
use crate::core::{ClaimMode, JobQueue, ResultStore};
use crate::submit::Submitter;
use crate::worker::{BatchTransform, BatchWorker};

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_QUEUE: &str = "image_queue";
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_MAX_ATTEMPTS: u32 = 100;
const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Snapshot of every knob the queue, worker and submitter recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub redis_url: String,
    pub queue_name: String,
    pub max_batch_size: usize,
    pub idle_interval: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub await_timeout: Option<Duration>,
    pub result_ttl: Duration,
    pub claim_mode: ClaimMode,
    pub result_key_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            queue_name: DEFAULT_QUEUE.to_string(),
            max_batch_size: DEFAULT_BATCH_SIZE,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            await_timeout: None,
            result_ttl: DEFAULT_RESULT_TTL,
            claim_mode: ClaimMode::default(),
            result_key_prefix: String::new(),
        }
    }
}

/// The knobs the worker loop uses.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub max_batch_size: usize,
    pub idle_interval: Duration,
    pub result_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Config::default().worker_config()
    }
}

/// The knobs the submission/await path uses.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub await_timeout: Option<Duration>,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Config::default().submit_config()
    }
}

impl Config {
    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("REDIS_URL") {
            cfg.redis_url = url;
        } else if let Some(host) = lookup("REDIS_HOST") {
            cfg.redis_url = format!("redis://{host}:6379");
        }
        if let Some(queue) = lookup("IMAGE_QUEUE") {
            cfg.queue_name = queue;
        }
        if let Some(raw) = lookup("BATCH_SIZE") {
            cfg.max_batch_size = parse("BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("SERVER_SLEEP") {
            cfg.idle_interval = parse_seconds("SERVER_SLEEP", &raw)?;
        }
        if let Some(raw) = lookup("CLIENT_SLEEP") {
            cfg.poll_interval = parse_seconds("CLIENT_SLEEP", &raw)?;
        }
        if let Some(raw) = lookup("CLIENT_MAX_TRIES") {
            cfg.max_attempts = parse("CLIENT_MAX_TRIES", &raw)?;
        }
        if let Some(raw) = lookup("CLIENT_TIMEOUT") {
            cfg.await_timeout = Some(parse_seconds("CLIENT_TIMEOUT", &raw)?);
        }
        if let Some(raw) = lookup("RESULT_TTL") {
            cfg.result_ttl = parse_seconds("RESULT_TTL", &raw)?;
        }
        if let Some(raw) = lookup("CLAIM_MODE") {
            cfg.claim_mode = parse("CLAIM_MODE", &raw)?;
        }
        if let Some(prefix) = lookup("RESULT_KEY_PREFIX") {
            cfg.result_key_prefix = prefix;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values that would stall the protocol.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::invalid("BATCH_SIZE", "0", "batch size must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("CLIENT_MAX_TRIES", "0", "at least one attempt is required"));
        }
        if self.result_ttl.is_zero() {
            return Err(ConfigError::invalid("RESULT_TTL", "0", "results must live for a non-zero duration"));
        }
        if self.queue_name.is_empty() {
            return Err(ConfigError::invalid("IMAGE_QUEUE", "", "queue name must not be empty"));
        }
        Ok(())
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_batch_size: self.max_batch_size,
            idle_interval: self.idle_interval,
            result_ttl: self.result_ttl,
        }
    }

    pub fn submit_config(&self) -> SubmitConfig {
        SubmitConfig {
            poll_interval: self.poll_interval,
            max_attempts: self.max_attempts,
            await_timeout: self.await_timeout,
        }
    }
}

/// Wiring helpers: build protocol components over a shared broker.
impl Config {
    pub fn job_queue<B: Broker>(&self, broker: Arc<B>) -> JobQueue<B> {
        JobQueue::with_mode(broker, self.queue_name.clone(), self.claim_mode)
    }

    pub fn result_store<B: Broker>(&self, broker: Arc<B>) -> ResultStore<B> {
        ResultStore::with_prefix(broker, self.result_key_prefix.clone())
    }

    pub fn submitter<B: Broker>(&self, broker: Arc<B>) -> Submitter<B> {
        Submitter::new(
            self.job_queue(broker.clone()),
            self.result_store(broker),
            self.submit_config(),
        )
    }

    pub fn worker<B, T, P, R>(&self, broker: Arc<B>, transform: T) -> BatchWorker<B, T, P, R>
    where
        B: Broker,
        T: BatchTransform<P, R>,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + Sync + 'static,
    {
        BatchWorker::new(
            self.job_queue(broker.clone()),
            self.result_store(broker),
            transform,
            self.worker_config(),
        )
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::invalid(key, raw, e))
}

fn parse_seconds(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse(key, raw)?;
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(key, raw, e))
}
