//! Gateway configuration.

use core_config::cluster::ClusterConfig;
use core_config::server::ServerConfig;
use core_config::{Environment, FromEnv};

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    /// Cluster settings, present only when `CLUSTER_HOSTS` is set. Without
    /// them the gateway starts disconnected and waits for `/connect`.
    pub cluster: Option<ClusterConfig>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;
        let cluster = if std::env::var("CLUSTER_HOSTS").is_ok() {
            Some(ClusterConfig::from_env()?)
        } else {
            None
        };

        Ok(Self {
            environment,
            server,
            cluster,
        })
    }
}
