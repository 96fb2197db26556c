// Runtime configuration read from the environment.
//
// Responsibilities
// - Provide defaults for every setting.
// - Reject values that cannot be parsed or are out of range instead of silently falling back.
//
// Boundaries
// - Loading a .env file is the binary's job; this module only reads variables.

use crate::core::stream_id_hasher::MAX_STREAM_ID_HASH_LENGTH;
use thiserror::Error;

pub const DISPATCH_BATCH_SIZE_KEY: &str = "EVENTSTORE_DISPATCH_BATCH_SIZE";
pub const MAX_STREAM_ID_HASH_LENGTH_KEY: &str = "EVENTSTORE_MAX_STREAM_ID_HASH_LENGTH";
pub const LOG_FILTER_KEY: &str = "EVENTSTORE_LOG_FILTER";

/// Number of denormalization commands grouped in one projection transaction.
pub const DEFAULT_DISPATCH_BATCH_SIZE: usize = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        key: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStoreConfig {
    pub dispatch_batch_size: usize,
    pub max_stream_id_hash_length: usize,
    pub log_filter: String,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            dispatch_batch_size: DEFAULT_DISPATCH_BATCH_SIZE,
            max_stream_id_hash_length: MAX_STREAM_ID_HASH_LENGTH,
            log_filter: "info".to_string(),
        }
    }
}

impl EventStoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let batch_size = positive(DISPATCH_BATCH_SIZE_KEY, &lookup)?;
        let hash_length = positive(MAX_STREAM_ID_HASH_LENGTH_KEY, &lookup)?;
        Ok(Self {
            dispatch_batch_size: batch_size.unwrap_or(defaults.dispatch_batch_size),
            max_stream_id_hash_length: hash_length.unwrap_or(defaults.max_stream_id_hash_length),
            log_filter: lookup(LOG_FILTER_KEY)
                .filter(|filter| !filter.trim().is_empty())
                .unwrap_or(defaults.log_filter),
        })
    }
}

fn positive(
    key: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<usize>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod event_store_config_tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[rstest]
    fn it_should_fall_back_to_defaults() {
        let config = EventStoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EventStoreConfig::default());
        assert_eq!(config.dispatch_batch_size, 30);
        assert_eq!(config.max_stream_id_hash_length, 40);
        assert_eq!(config.log_filter, "info");
    }

    #[rstest]
    fn it_should_read_overrides() {
        let config = EventStoreConfig::from_lookup(lookup_from(&[
            (DISPATCH_BATCH_SIZE_KEY, "5"),
            (MAX_STREAM_ID_HASH_LENGTH_KEY, " 64 "),
            (LOG_FILTER_KEY, "optimistic_events=debug"),
        ]))
        .unwrap();
        assert_eq!(config.dispatch_batch_size, 5);
        assert_eq!(config.max_stream_id_hash_length, 64);
        assert_eq!(config.log_filter, "optimistic_events=debug");
    }

    #[rstest]
    #[case(DISPATCH_BATCH_SIZE_KEY, "0")]
    #[case(DISPATCH_BATCH_SIZE_KEY, "-3")]
    #[case(MAX_STREAM_ID_HASH_LENGTH_KEY, "forty")]
    fn it_should_reject_invalid_values(#[case] key: &'static str, #[case] value: &str) {
        let result = EventStoreConfig::from_lookup(lookup_from(&[(key, value)]));
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                key,
                value: value.to_string()
            })
        );
    }
}
