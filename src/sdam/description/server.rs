use std::fmt;

use crate::error::{Error, Result};

/// The minimum wire version a server must speak for reads against it to be retried.
pub(crate) const RETRYABLE_READS_MIN_WIRE_VERSION: i32 = 6;

/// The minimum wire version a server must speak for writes against it to be retried.
pub(crate) const RETRYABLE_WRITES_MIN_WIRE_VERSION: i32 = 6;

/// The default port a server listens on.
pub(crate) const DEFAULT_PORT: u16 = 24017;

/// The type of a server in the deployment, as determined by monitoring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ServerType {
    /// A single server not part of a replica set or sharded cluster.
    Standalone,

    /// A router in a sharded cluster.
    Router,

    /// The primary of a replica set.
    RsPrimary,

    /// A secondary of a replica set.
    RsSecondary,

    /// An arbiter of a replica set.
    RsArbiter,

    /// A replica set member that is none of the above (e.g. hidden or in startup).
    RsOther,

    /// A load balancer fronting the deployment.
    LoadBalancer,

    /// A server whose type is not yet known.
    Unknown,
}

impl ServerType {
    /// Whether a server of this type can service reads or writes.
    pub fn is_data_bearing(self) -> bool {
        matches!(
            self,
            ServerType::Standalone
                | ServerType::Router
                | ServerType::RsPrimary
                | ServerType::RsSecondary
                | ServerType::LoadBalancer
        )
    }

    /// Whether a server of this type is available per the monitoring state machine.
    pub fn is_available(self) -> bool {
        self != ServerType::Unknown
    }
}

/// The location of a server in the deployment.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ServerAddress {
    /// A TCP/IP host and port combination.
    #[non_exhaustive]
    Tcp {
        /// The hostname or IP address where the server can be found.
        host: String,

        /// The port that the server is listening on. The default is 24017.
        port: Option<u16>,
    },
}

impl ServerAddress {
    /// Parses an address string into a `ServerAddress`.
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();
        let mut parts = address.split(':');
        let hostname = match parts.next() {
            Some(part) if !part.is_empty() => part,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "invalid server address: \"{address}\""
                )))
            }
        };
        let port = match parts.next() {
            None => None,
            Some(part) => match (part.parse::<u16>(), parts.next()) {
                (Ok(port), None) if port != 0 => Some(port),
                _ => {
                    return Err(Error::invalid_argument(format!(
                        "port must be an integer between 1 and 65535, instead got: \"{part}\""
                    )))
                }
            },
        };
        Ok(Self::Tcp {
            host: hostname.to_string(),
            port,
        })
    }

    /// The hostname portion of this address.
    pub fn host(&self) -> &str {
        match self {
            Self::Tcp { host, .. } => host.as_str(),
        }
    }

    /// The port portion of this address, if one was specified.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Tcp { port, .. } => *port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => {
                write!(fmt, "{}:{}", host, port.unwrap_or(DEFAULT_PORT))
            }
        }
    }
}

/// A description of the most up-to-date information known about a server, as observed by the
/// monitoring layer.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerDescription {
    /// The address of this server.
    pub address: ServerAddress,

    /// The type of this server.
    pub server_type: ServerType,

    /// The maximum wire version the server speaks, if a handshake has completed.
    pub max_wire_version: Option<i32>,
}

impl ServerDescription {
    /// Creates a new description from the given monitoring observations.
    pub fn new(
        address: ServerAddress,
        server_type: ServerType,
        max_wire_version: impl Into<Option<i32>>,
    ) -> Self {
        Self {
            address,
            server_type,
            max_wire_version: max_wire_version.into(),
        }
    }

    /// Whether writes dispatched to this server may be retried.
    pub fn supports_retryable_writes(&self) -> bool {
        self.server_type != ServerType::Standalone
            && self.max_wire_version.unwrap_or(0) >= RETRYABLE_WRITES_MIN_WIRE_VERSION
    }

    /// Whether reads dispatched to this server may be retried.
    pub fn supports_retryable_reads(&self) -> bool {
        self.max_wire_version.unwrap_or(0) >= RETRYABLE_READS_MIN_WIRE_VERSION
    }
}

#[test]
fn address_parsing() {
    let address = ServerAddress::parse("db1.example.com:12345").unwrap();
    assert_eq!(address.host(), "db1.example.com");
    assert_eq!(address.port(), Some(12345));
    assert_eq!(address.to_string(), "db1.example.com:12345");

    let address = ServerAddress::parse("db1.example.com").unwrap();
    assert_eq!(address.port(), None);
    assert_eq!(address.to_string(), format!("db1.example.com:{DEFAULT_PORT}"));

    assert!(ServerAddress::parse("").is_err());
    assert!(ServerAddress::parse("db1.example.com:0").is_err());
    assert!(ServerAddress::parse("db1.example.com:123456").is_err());
    assert!(ServerAddress::parse("db1.example.com:12345:67").is_err());
}
