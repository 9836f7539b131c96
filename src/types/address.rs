//! Textual `ip:port` / `[ip]:port` address codec.
//!
//! This is the single codec shared by the probe client (to build its
//! announcement) and the rendezvous server (to decode it):
//! - IPv4: `198.51.100.7:54321`
//! - IPv6: `[2001:db8::1]:54321`
//!
//! Parsing is strict. A string is either accepted whole or rejected,
//! never repaired into a best-effort value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

/// Address family of an [`AddressSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// Error type for address parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("missing ':' between address and port")]
    MissingPort,
    #[error("missing closing ']' in IPv6 address")]
    UnclosedBracket,
    #[error("expected ':' after ']'")]
    MissingPortSeparator,
    #[error("invalid port: '{0}'")]
    InvalidPort(String),
    #[error("invalid IPv4 address: '{0}'")]
    InvalidIpv4(String),
    #[error("invalid IPv6 address: '{0}'")]
    InvalidIpv6(String),
    #[error("unspecified address {0} cannot be connected back to")]
    Unspecified(String),
}

/// A typed candidate address: an IP literal of a known family plus a port.
///
/// Port 0 is only meaningful before a listener has been created
/// (it asks the OS to pick one). Serializes as its wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressSpec {
    ip: IpAddr,
    port: u16,
}

impl AddressSpec {
    /// Create an address spec from an IP and port.
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Parse `ip:port` or `[ip]:port`.
    ///
    /// A leading `[` selects IPv6: the text up to the first `]` is the
    /// address and `]` must be followed directly by `:`. Anything else is
    /// IPv4, split at the last `:`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or(AddressError::UnclosedBracket)?;
            let port = tail
                .strip_prefix(':')
                .ok_or(AddressError::MissingPortSeparator)?;
            let ip = host
                .parse::<Ipv6Addr>()
                .map_err(|_| AddressError::InvalidIpv6(host.to_string()))?;
            Ok(Self::new(IpAddr::V6(ip), parse_port(port)?))
        } else {
            let (host, port) = s.rsplit_once(':').ok_or(AddressError::MissingPort)?;
            let ip = host
                .parse::<Ipv4Addr>()
                .map_err(|_| AddressError::InvalidIpv4(host.to_string()))?;
            Ok(Self::new(IpAddr::V4(ip), parse_port(port)?))
        }
    }

    /// The address family.
    pub fn family(&self) -> AddressFamily {
        match self.ip {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// The IP literal.
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Whether the IP is the wildcard `0.0.0.0` / `::`.
    pub fn is_unspecified(&self) -> bool {
        self.ip.is_unspecified()
    }

    /// Convert to a socket address for binding or connecting.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Decimal port, digits only. `+80`, `80 ` and `70000` are all rejected.
fn parse_port(s: &str) -> Result<u16, AddressError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::InvalidPort(s.to_string()));
    }
    s.parse()
        .map_err(|_| AddressError::InvalidPort(s.to_string()))
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

impl FromStr for AddressSpec {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AddressSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AddressSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

impl From<SocketAddr> for AddressSpec {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<AddressSpec> for SocketAddr {
    fn from(spec: AddressSpec) -> Self {
        spec.socket_addr()
    }
}

/// An address that may be sent to the peer as an announcement.
///
/// Unlike a bare [`AddressSpec`], it never holds the unspecified address,
/// since nothing can connect back to "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Announcement(AddressSpec);

impl Announcement {
    /// Wrap an address, rejecting the unspecified address.
    pub fn new(spec: AddressSpec) -> Result<Self, AddressError> {
        if spec.is_unspecified() {
            return Err(AddressError::Unspecified(spec.ip().to_string()));
        }
        Ok(Self(spec))
    }

    /// Decode announcement text received from a peer.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        Self::new(AddressSpec::parse(s)?)
    }

    /// The announced address.
    pub const fn address(&self) -> AddressSpec {
        self.0
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
