use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One addressable node of the database cluster. Immutable once built.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Parse `"host"` or `"host:port"`, applying `default_port` when the
    /// entry carries no port of its own.
    pub fn parse(s: &str, default_port: u16) -> Result<Self, EndpointParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| EndpointParseError::InvalidPort(s.to_string()))?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(EndpointParseError::Empty),
            None => Ok(Self::new(s, default_port)),
        }
    }

    /// Parse a list of contact points, preserving order.
    pub fn parse_list(
        points: &[impl AsRef<str>],
        default_port: u16,
    ) -> Result<Vec<Self>, EndpointParseError> {
        points
            .iter()
            .map(|p| Self::parse(p.as_ref(), default_port))
            .collect()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some(_) => Self::parse(s, 0),
            None => Err(EndpointParseError::MissingPort(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("empty endpoint")]
    Empty,

    #[error("invalid port in endpoint '{0}'")]
    InvalidPort(String),

    #[error("endpoint '{0}' is missing a port")]
    MissingPort(String),
}

/// Database credentials, passed through to the wire protocol untouched.
#[derive(Clone)]
pub struct Credentials {
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

// Manual Debug: the password must never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_only_uses_default_port() {
        let ep = Endpoint::parse("10.0.0.1", 5433).unwrap();
        assert_eq!(ep.host(), "10.0.0.1");
        assert_eq!(ep.port(), 5433);
    }

    #[test]
    fn test_parse_host_with_port_overrides_default() {
        let ep = Endpoint::parse("10.0.0.2:5434", 5433).unwrap();
        assert_eq!(ep.host(), "10.0.0.2");
        assert_eq!(ep.port(), 5434);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let ep = Endpoint::parse("  node1.local  ", 5433).unwrap();
        assert_eq!(ep.host(), "node1.local");
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert_eq!(
            Endpoint::parse("host:yes", 5433),
            Err(EndpointParseError::InvalidPort("host:yes".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(Endpoint::parse("", 5433), Err(EndpointParseError::Empty));
        assert_eq!(Endpoint::parse(":5433", 5433), Err(EndpointParseError::Empty));
    }

    #[test]
    fn test_parse_list_preserves_order() {
        let eps = Endpoint::parse_list(&["a", "b:9000", "c"], 5433).unwrap();
        assert_eq!(eps.len(), 3);
        assert_eq!(eps[0], Endpoint::new("a", 5433));
        assert_eq!(eps[1], Endpoint::new("b", 9000));
        assert_eq!(eps[2], Endpoint::new("c", 5433));
    }

    #[test]
    fn test_display_roundtrip() {
        let ep = Endpoint::new("10.0.0.1", 5433);
        assert_eq!(ep.to_string(), "10.0.0.1:5433");
        assert_eq!("10.0.0.1:5433".parse::<Endpoint>().unwrap(), ep);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("yugabyte", "admin", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
