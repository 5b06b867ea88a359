use crate::{env_or_default, env_required, ConfigError, FromEnv};

/// Connection settings for a distributed SQL cluster.
///
/// `contact_points` holds one `"host"` or `"host:port"` entry per cluster
/// node; entries without an explicit port use `default_port`. Credentials
/// are passed through to the wire protocol untouched.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Cluster nodes, tried in order on connect
    pub contact_points: Vec<String>,

    /// Port applied to contact points that do not carry their own
    pub default_port: u16,

    /// Database name
    pub database: String,

    /// Database user
    pub username: String,

    /// Database password
    pub password: String,

    /// Per-endpoint connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Per-attempt query timeout in seconds
    pub query_timeout_secs: u64,

    /// How long a pooled connection's last successful check stays fresh,
    /// in seconds; stale connections are probed before being handed out
    pub freshness_secs: u64,

    /// How many times a failed query is retried on an alternate connection
    pub retry_budget: u32,
}

impl ClusterConfig {
    pub fn new(
        contact_points: Vec<impl Into<String>>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            contact_points: contact_points.into_iter().map(Into::into).collect(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn with_retry_budget(mut self, retries: u32) -> Self {
        self.retry_budget = retries;
        self
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            contact_points: vec!["127.0.0.1".to_string()],
            default_port: 5433,
            database: "yugabyte".to_string(),
            username: "yugabyte".to_string(),
            password: String::new(),
            connect_timeout_secs: 10,
            query_timeout_secs: 30,
            freshness_secs: 30,
            retry_budget: 1,
        }
    }
}

impl FromEnv for ClusterConfig {
    /// Reads from environment variables:
    /// - CLUSTER_HOSTS: comma-separated "host" or "host:port" list (required)
    /// - CLUSTER_PORT: default port for hosts without one (default: 5433)
    /// - CLUSTER_DATABASE / CLUSTER_USER: required
    /// - CLUSTER_PASSWORD: default empty
    /// - CLUSTER_CONNECT_TIMEOUT_SECS (default: 10)
    /// - CLUSTER_QUERY_TIMEOUT_SECS (default: 30)
    /// - CLUSTER_FRESHNESS_SECS (default: 30)
    /// - CLUSTER_RETRY_BUDGET (default: 1)
    fn from_env() -> Result<Self, ConfigError> {
        let hosts = env_required("CLUSTER_HOSTS")?;
        let contact_points: Vec<String> = hosts
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if contact_points.is_empty() {
            return Err(ConfigError::ParseError {
                key: "CLUSTER_HOSTS".to_string(),
                details: "no contact points".to_string(),
            });
        }

        Ok(Self {
            contact_points,
            default_port: parse_env("CLUSTER_PORT", "5433")?,
            database: env_required("CLUSTER_DATABASE")?,
            username: env_required("CLUSTER_USER")?,
            password: env_or_default("CLUSTER_PASSWORD", ""),
            connect_timeout_secs: parse_env("CLUSTER_CONNECT_TIMEOUT_SECS", "10")?,
            query_timeout_secs: parse_env("CLUSTER_QUERY_TIMEOUT_SECS", "30")?,
            freshness_secs: parse_env("CLUSTER_FRESHNESS_SECS", "30")?,
            retry_budget: parse_env("CLUSTER_RETRY_BUDGET", "1")?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_or_default(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: format!("{}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_config_from_env() {
        temp_env::with_vars(
            [
                ("CLUSTER_HOSTS", Some("10.0.0.1,10.0.0.2:5434")),
                ("CLUSTER_DATABASE", Some("yugabyte")),
                ("CLUSTER_USER", Some("yugabyte")),
                ("CLUSTER_PASSWORD", None),
                ("CLUSTER_PORT", None),
            ],
            || {
                let config = ClusterConfig::from_env().unwrap();
                assert_eq!(config.contact_points, vec!["10.0.0.1", "10.0.0.2:5434"]);
                assert_eq!(config.default_port, 5433);
                assert_eq!(config.database, "yugabyte");
                assert_eq!(config.password, "");
                assert_eq!(config.retry_budget, 1);
            },
        );
    }

    #[test]
    fn test_cluster_config_hosts_required() {
        temp_env::with_var_unset("CLUSTER_HOSTS", || {
            let result = ClusterConfig::from_env();
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("CLUSTER_HOSTS"));
        });
    }

    #[test]
    fn test_cluster_config_rejects_empty_host_list() {
        temp_env::with_vars(
            [
                ("CLUSTER_HOSTS", Some(" , ")),
                ("CLUSTER_DATABASE", Some("db")),
                ("CLUSTER_USER", Some("u")),
            ],
            || {
                assert!(ClusterConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_cluster_config_invalid_retry_budget() {
        temp_env::with_vars(
            [
                ("CLUSTER_HOSTS", Some("10.0.0.1")),
                ("CLUSTER_DATABASE", Some("db")),
                ("CLUSTER_USER", Some("u")),
                ("CLUSTER_RETRY_BUDGET", Some("lots")),
            ],
            || {
                let result = ClusterConfig::from_env();
                assert!(result.is_err());
                assert!(result
                    .unwrap_err()
                    .to_string()
                    .contains("CLUSTER_RETRY_BUDGET"));
            },
        );
    }

    #[test]
    fn test_cluster_config_builder() {
        let config = ClusterConfig::new(vec!["n1", "n2"], "db", "user", "pw")
            .with_default_port(5434)
            .with_retry_budget(2);
        assert_eq!(config.contact_points, vec!["n1", "n2"]);
        assert_eq!(config.default_port, 5434);
        assert_eq!(config.retry_budget, 2);
    }
}
