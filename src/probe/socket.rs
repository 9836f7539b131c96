//! Socket plumbing for the probe client.
//!
//! Binding the candidate listener goes through `socket2` so the socket
//! options can be set before `bind`; the control connection is a plain
//! tokio connect over every address the server host resolves to.

use crate::error::ProbeError;
use crate::types::AddressSpec;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Pending connections the candidate listener queues. Only one callback
/// is ever expected.
const LISTEN_BACKLOG: i32 = 4;

/// Bind a listener on `addr` (normally with port 0).
///
/// IPv6 listeners are dual-stack where the platform allows it, so a
/// wildcard `::` candidate also accepts IPv4 callbacks.
pub fn bind_listener(addr: AddressSpec) -> io::Result<TcpListener> {
    let sock_addr = addr.socket_addr();
    let socket = if sock_addr.is_ipv6() {
        let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
        if let Err(e) = socket.set_only_v6(false) {
            debug!(error = %e, "set_only_v6(false) not supported");
        }
        socket
    } else {
        Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?
    };
    socket.set_reuse_address(true)?;
    socket.bind(&sock_addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

/// Resolve the server host to candidate IPs.
///
/// IP literals (bracketed or not) skip DNS entirely.
pub async fn resolve_host(host: &str) -> Result<Vec<IpAddr>, ProbeError> {
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| ProbeError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

    let ips: Vec<IpAddr> = response.iter().collect();
    if ips.is_empty() {
        return Err(ProbeError::Resolve {
            host: host.to_string(),
            reason: "no addresses found".to_string(),
        });
    }
    Ok(ips)
}

/// Open the control connection, trying each resolved address once in order.
pub async fn connect_server(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, ProbeError> {
    let ips = resolve_host(host).await?;
    let mut last_error = String::from("no addresses tried");

    for ip in ips {
        let addr = SocketAddr::new(ip, port);
        debug!(server = %addr, "connecting to server");
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => last_error = format!("{}: {}", addr, e),
            Err(_) => last_error = format!("{}: timed out after {:?}", addr, connect_timeout),
        }
    }

    Err(ProbeError::ConnectServer {
        server: format!("{}:{}", host, port),
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_bind_assigns_port() {
        let listener = bind_listener(AddressSpec::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_bind_foreign_address_fails() {
        // TEST-NET-1 is never assigned to a local interface.
        let result = bind_listener(AddressSpec::new("192.0.2.1".parse().unwrap(), 0));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_literals() {
        assert_eq!(
            resolve_host("203.0.113.5").await.unwrap(),
            vec!["203.0.113.5".parse::<IpAddr>().unwrap()]
        );
        assert_eq!(
            resolve_host("[2001:db8::1]").await.unwrap(),
            vec!["2001:db8::1".parse::<IpAddr>().unwrap()]
        );
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);

        let err = connect_server("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::ConnectServer { .. }));
    }
}
