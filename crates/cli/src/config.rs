use anyhow::{Context, Result};
use ptkl_argparse::tree::DEFAULT_USAGE_CAPACITY;

use crate::scan::DEFAULT_INCLUDE_LIMIT;

pub const PROGRAM_NAME: &str = "ptkl";
pub const TITLE: &str = "Partikle Runtime";

pub const INCLUDE_LIMIT_ENV: &str = "PTKL_INCLUDE_LIMIT";
pub const USAGE_CAPACITY_ENV: &str = "PTKL_USAGE_CAPACITY";

/// Launcher configuration, fixed for the lifetime of one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub program: String,
    pub title: String,
    pub version: String,
    pub usage: String,
    /// Maximum number of `-I/--include` files.
    pub include_limit: usize,
    /// Usage buffer size for each command of the help tree.
    pub usage_capacity: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: PROGRAM_NAME.to_string(),
            title: TITLE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            usage: format!("usage: {PROGRAM_NAME} [options] [file [args]]"),
            include_limit: DEFAULT_INCLUDE_LIMIT,
            usage_capacity: DEFAULT_USAGE_CAPACITY,
        }
    }
}

impl CliConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let env: Vec<(String, String)> = std::env::vars().collect();
        Self::from_env_pairs(&env)
    }

    /// Build configuration from explicit `(key, value)` pairs.
    pub fn from_env_pairs(env: &[(String, String)]) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = env_lookup(env, INCLUDE_LIMIT_ENV) {
            config.include_limit = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {INCLUDE_LIMIT_ENV}: {raw:?}"))?;
        }
        if let Some(raw) = env_lookup(env, USAGE_CAPACITY_ENV) {
            config.usage_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {USAGE_CAPACITY_ENV}: {raw:?}"))?;
        }

        tracing::debug!(
            include_limit = config.include_limit,
            usage_capacity = config.usage_capacity,
            "loaded launcher configuration"
        );
        Ok(config)
    }
}

fn env_lookup<'e>(env: &'e [(String, String)], key: &str) -> Option<&'e str> {
    env.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = CliConfig::from_env_pairs(&[]).unwrap();
        assert_eq!(config.program, "ptkl");
        assert_eq!(config.include_limit, 32);
        assert_eq!(config.usage_capacity, 32);
        assert_eq!(config.usage, "usage: ptkl [options] [file [args]]");
    }

    #[test]
    fn overrides_are_applied() {
        let env = pairs(&[(INCLUDE_LIMIT_ENV, " 4 "), (USAGE_CAPACITY_ENV, "64")]);
        let config = CliConfig::from_env_pairs(&env).unwrap();
        assert_eq!(config.include_limit, 4);
        assert_eq!(config.usage_capacity, 64);
    }

    #[test]
    fn malformed_override_is_an_error() {
        let env = pairs(&[(INCLUDE_LIMIT_ENV, "many")]);
        let err = CliConfig::from_env_pairs(&env).unwrap_err();
        assert!(format!("{err:#}").contains(INCLUDE_LIMIT_ENV));
    }
}
