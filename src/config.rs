//! Runtime configuration.
//!
//! Read once from the environment on first use and immutable afterwards.

use lazy_static::lazy_static;

use crate::error::{Error, ErrorOr};

/// Byte written over freed blocks when scrubbing is enabled.
pub const SCRUB_BYTE: u8 = 0xE1;

const HEAP_LIMIT_KEY: &str = "BOOTSTRAP_HEAP_LIMIT";
const SCRUB_FREED_KEY: &str = "BOOTSTRAP_SCRUB_FREED";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig
{
    /// Upper bound on live bytes handed out by `SystemAllocator`.
    pub heap_limit: Option<usize>,

    /// Overwrite freed blocks with [`SCRUB_BYTE`] before releasing them.
    pub scrub_freed: bool,
}

lazy_static! {
    static ref CONFIG: RuntimeConfig = RuntimeConfig::from_env();
}

impl RuntimeConfig
{
    /// The process-wide configuration.
    pub fn global() -> &'static RuntimeConfig { &CONFIG }

    /// Parse the configuration from the process environment, falling back to
    /// defaults for anything malformed.
    pub fn from_env() -> Self
    {
        let config = match Self::from_lookup(|key| std::env::var(key).ok()) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring runtime configuration: {err}");
                Self::default()
            }
        };
        #[cfg(not(feature = "global"))]
        if config.heap_limit.is_some() {
            log::warn!("{HEAP_LIMIT_KEY} ignored: built without the `global` feature");
        }
        config
    }

    pub fn from_lookup<F>(lookup: F) -> ErrorOr<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(HEAP_LIMIT_KEY) {
            let limit = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidConfiguration {
                    key: HEAP_LIMIT_KEY,
                    value: raw.clone(),
                })?;
            config.heap_limit = Some(limit);
        }

        if let Some(raw) = lookup(SCRUB_FREED_KEY) {
            config.scrub_freed = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(Error::InvalidConfiguration {
                        key: SCRUB_FREED_KEY,
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}
