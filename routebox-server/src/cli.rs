//! Command line and environment configuration.
//!
//! Flags override the YAML file, which overrides the built-in defaults:
//!
//! ```bash
//! routebox --config routebox.yaml --listen 127.0.0.1:8080
//! REDIS_URL=redis://cache:6379/ VROOM_URL=http://vroom:3000/ routebox
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use routebox::config::{Config, ConfigError, MemoryConfig, RedisConfig, StoreConfig};

/// Caching proxy for routing optimization services.
#[derive(Debug, Clone, Parser)]
#[command(name = "routebox")]
#[command(version)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "ROUTEBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the HTTP server binds to [default: 0.0.0.0:8080].
    #[arg(long, env = "ROUTEBOX_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Redis connection URL [default: redis://127.0.0.1:6379/].
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Upstream optimization endpoint [default: http://127.0.0.1:3000/].
    #[arg(long, env = "VROOM_URL")]
    pub upstream_url: Option<String>,

    /// Use an in-process store instead of Redis, ignoring `--redis-url`.
    #[arg(long)]
    pub memory_store: bool,
}

impl Cli {
    /// Loads the configuration file, if any, and applies the overrides.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        let config = self.apply(config);
        config.validate()?;
        Ok(config)
    }

    /// Applies flag and environment overrides to `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(listen) = self.listen {
            config.listen = Some(listen);
        }
        if let Some(url) = &self.upstream_url {
            config.upstream.url = url.clone();
        }
        if self.memory_store {
            if !matches!(config.store, StoreConfig::Memory(_)) {
                config.store = StoreConfig::Memory(MemoryConfig::default());
            }
        } else if let Some(url) = &self.redis_url {
            config.store = match config.store {
                StoreConfig::Redis(redis) => StoreConfig::Redis(RedisConfig {
                    connection_string: url.clone(),
                    ..redis
                }),
                StoreConfig::Memory(_) => StoreConfig::Redis(RedisConfig {
                    connection_string: url.clone(),
                    ..RedisConfig::default()
                }),
            };
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "routebox",
            "--listen",
            "127.0.0.1:9000",
            "--upstream-url",
            "http://vroom:3000/",
            "--redis-url",
            "redis://cache:6379/",
        ]);

        let config = cli.apply(Config::default());

        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.upstream.url, "http://vroom:3000/");
        let StoreConfig::Redis(redis) = config.store else {
            panic!("expected Redis store");
        };
        assert_eq!(redis.connection_string, "redis://cache:6379/");
    }

    #[test]
    fn memory_flag_selects_memory_store() {
        let cli = Cli::parse_from(["routebox", "--memory-store"]);

        let config = cli.apply(Config::default());

        assert!(matches!(config.store, StoreConfig::Memory(_)));
    }

    #[test]
    fn memory_flag_wins_over_redis_url() {
        let cli = Cli::parse_from([
            "routebox",
            "--memory-store",
            "--redis-url",
            "redis://cache:6379/",
        ]);

        let config = cli.apply(Config::default());

        assert!(matches!(config.store, StoreConfig::Memory(_)));
    }
}
