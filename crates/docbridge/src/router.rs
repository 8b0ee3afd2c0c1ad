//! # Shard Router
//!
//! Maps an optional shard key to one of `N` shard instance names and resolves a fresh handle
//! through the registry.
//!
//! - `Number(n)`: `|n| mod N`
//! - non-empty `Text(s)`: 31-multiplier hash over UTF-16 code units in wrapping 32-bit signed
//!   arithmetic, then `|hash| mod N`
//! - absent or empty key: uniformly random index
//!
//! Keyed routing is a pure function of the key and `N`. The router keeps no handles: every
//! call goes back to the registry.

use crate::config::{BridgeConfig, ConfigError};
use crate::error::BridgeError;
use crate::shard_actor::{BridgeHandle, BridgeRegistry};
use rand::Rng;
use tracing::debug;

/// A logical routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShardKey {
    Number(i64),
    Text(String),
}

impl From<i64> for ShardKey {
    fn from(n: i64) -> Self {
        ShardKey::Number(n)
    }
}

impl From<i32> for ShardKey {
    fn from(n: i32) -> Self {
        ShardKey::Number(n.into())
    }
}

impl From<&str> for ShardKey {
    fn from(s: &str) -> Self {
        ShardKey::Text(s.to_string())
    }
}

impl From<String> for ShardKey {
    fn from(s: String) -> Self {
        ShardKey::Text(s)
    }
}

/// 32-bit string hash: `hash = hash * 31 + unit` over UTF-16 code units, wrapping.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// The deterministic index for `key`, or `None` when the key does not pin a shard.
pub fn keyed_index(key: &ShardKey, shard_count: usize) -> Option<usize> {
    let n = shard_count as u64;
    match key {
        ShardKey::Number(number) => Some((number.unsigned_abs() % n) as usize),
        ShardKey::Text(text) if !text.is_empty() => {
            Some((i64::from(string_hash(text)).unsigned_abs() % n) as usize)
        }
        ShardKey::Text(_) => None,
    }
}

/// Index of the shard that serves `key`; random when there is no usable key.
pub fn shard_index(key: Option<&ShardKey>, shard_count: usize) -> usize {
    key.and_then(|k| keyed_index(k, shard_count))
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..shard_count))
}

/// Resolves a fresh handle to the shard serving `key`.
pub fn route(
    registry: &BridgeRegistry,
    config: &BridgeConfig,
    key: Option<&ShardKey>,
) -> Result<BridgeHandle, BridgeError> {
    config.validate()?;
    let index = shard_index(key, config.shard_count);
    let name = config.instance_name(index);
    debug!(shard = %name, ?key, "Routing");
    registry
        .resolve(&name)
        .map_err(|e| BridgeError::Config(ConfigError::Unbound(e.to_string())))
}
