//! Probe client state machine.
//!
//! One [`ProbeSession`] runs exactly one detection attempt:
//!
//! ```text
//! Init -> Listening -> Connected -> Announced -> AwaitingCallback -> Succeeded
//!   \________\____________\____________\________________\__________-> Failed
//! ```
//!
//! The listener and the control connection are locals of the attempt, so
//! both are released when it ends, whatever the outcome.

use super::report::ProbeReport;
use super::socket::{bind_listener, connect_server};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::protocol::{self, Response};
use crate::types::{AddressSpec, Announcement, AttemptId, DetectionOutcome};
use chrono::Utc;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Bound on establishing the control connection (per resolved address).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the server's acknowledgement. Must exceed the time a
/// server spends connecting back and sending the token.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// State of a probe session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Init,
    Listening { port: u16 },
    Connected,
    Announced(AddressSpec),
    AwaitingCallback,
    Succeeded,
    Failed(DetectionOutcome),
}

impl ProbeState {
    /// Whether the session has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// A single detection attempt for one candidate address.
pub struct ProbeSession {
    id: AttemptId,
    config: ProbeConfig,
    state: ProbeState,
    announced: Option<AddressSpec>,
}

impl ProbeSession {
    /// Create a session for `config`.
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            id: AttemptId::new(),
            config,
            state: ProbeState::Init,
            announced: None,
        }
    }

    /// Attempt identifier.
    pub fn id(&self) -> AttemptId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    fn transition(&mut self, next: ProbeState) {
        debug!(from = ?self.state, to = ?next, "probe state");
        self.state = next;
    }

    /// Run the attempt to its terminal state.
    pub async fn run(mut self) -> ProbeReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let span = info_span!(
            "probe",
            id = %self.id.short(),
            candidate = %self.config.client_ip,
        );

        let result = self.drive().instrument(span.clone()).await;

        let (outcome, detail) = span.in_scope(|| match result {
            Ok(()) => {
                self.transition(ProbeState::Succeeded);
                info!("candidate is reachable");
                (DetectionOutcome::Success, None)
            }
            Err(e) => {
                let outcome = e.outcome();
                self.transition(ProbeState::Failed(outcome.clone()));
                warn!(outcome = outcome.label(), detail = %e, "detection failed");
                (outcome, Some(e.to_string()))
            }
        });

        ProbeReport {
            attempt_id: self.id,
            candidate: self.config.client_ip,
            announced: self.announced,
            server: self.config.server_display(),
            outcome,
            detail,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn drive(&mut self) -> Result<(), ProbeError> {
        let listener = self.listen()?;
        let mut control = self.connect().await?;
        let announced = self.announce(&listener, &mut control).await?;
        self.await_ack(control).await?;
        self.await_callback(listener, announced).await
    }

    /// Init -> Listening.
    fn listen(&mut self) -> Result<TcpListener, ProbeError> {
        let bind_addr = AddressSpec::new(self.config.client_ip, 0);
        let bind_error = |source| ProbeError::Bind {
            addr: bind_addr.to_string(),
            source,
        };

        let listener = bind_listener(bind_addr).map_err(bind_error)?;
        let port = listener.local_addr().map_err(bind_error)?.port();
        self.transition(ProbeState::Listening { port });
        Ok(listener)
    }

    /// Listening -> Connected.
    async fn connect(&mut self) -> Result<TcpStream, ProbeError> {
        let control = connect_server(
            &self.config.server_host,
            self.config.server_port,
            CONNECT_TIMEOUT,
        )
        .await?;
        self.transition(ProbeState::Connected);
        Ok(control)
    }

    /// Connected -> Announced. Sends the candidate with the assigned port.
    async fn announce(
        &mut self,
        listener: &TcpListener,
        control: &mut TcpStream,
    ) -> Result<AddressSpec, ProbeError> {
        let port = listener
            .local_addr()
            .map_err(ProbeError::Announce)?
            .port();
        let ip = announce_ip(self.config.client_ip, control.local_addr().ok().map(|a| a.ip()));
        let announcement = Announcement::new(AddressSpec::new(ip, port))?;

        timeout(
            CONNECT_TIMEOUT,
            protocol::write_message(control, &announcement.to_string()),
        )
        .await
        .map_err(|_| {
            ProbeError::Announce(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "announcement write timed out",
            ))
        })?
        .map_err(ProbeError::Announce)?;

        let announced = announcement.address();
        self.announced = Some(announced);
        self.transition(ProbeState::Announced(announced));
        Ok(announced)
    }

    /// Announced -> AwaitingCallback. The control connection is closed on
    /// return either way.
    async fn await_ack(&mut self, mut control: TcpStream) -> Result<(), ProbeError> {
        let wait = self.config.response_timeout;
        let text = timeout(wait, protocol::read_message(&mut control))
            .await
            .map_err(|_| ProbeError::Response(format!("no response within {:?}", wait)))?
            .map_err(|e| ProbeError::Response(e.to_string()))?;
        drop(control);

        if text.is_empty() {
            return Err(ProbeError::Response(
                "server closed the connection without responding".to_string(),
            ));
        }

        let response = Response::parse(&text);
        debug!(response = %response, "server response");
        if !response.is_success() {
            return Err(ProbeError::Rejected(response));
        }

        self.transition(ProbeState::AwaitingCallback);
        Ok(())
    }

    /// AwaitingCallback -> Succeeded. Accepting and reading share one
    /// deadline of `timeout` from entering this state.
    async fn await_callback(
        &mut self,
        listener: TcpListener,
        announced: AddressSpec,
    ) -> Result<(), ProbeError> {
        let wait = self.config.timeout;
        let deadline = Instant::now() + wait;
        debug!(addr = %announced, timeout = ?wait, "waiting for callback");

        let (mut stream, from) = timeout_at(deadline, listener.accept())
            .await
            .map_err(|_| ProbeError::CallbackTimeout(wait))?
            .map_err(|e| ProbeError::Callback(e.to_string()))?;
        drop(listener);
        debug!(from = %from, "callback connection accepted");

        let mut buf = [0u8; protocol::MAX_MESSAGE_SIZE];
        let n = timeout_at(deadline, stream.read(&mut buf))
            .await
            .map_err(|_| ProbeError::CallbackTimeout(wait))?
            .map_err(|e| ProbeError::Callback(e.to_string()))?;

        if n == 0 {
            return Err(ProbeError::Callback(
                "callback connection closed without payload".to_string(),
            ));
        }
        debug!(bytes = n, "callback payload received");
        Ok(())
    }
}

/// IP to announce for a candidate.
///
/// A wildcard candidate cannot be announced, so it is replaced by the
/// local address of the control connection when that address can reach
/// the wildcard listener (same family, or an IPv6 dual-stack listener).
/// Otherwise the wildcard is returned and announcing fails.
fn announce_ip(candidate: IpAddr, control_local: Option<IpAddr>) -> IpAddr {
    if !candidate.is_unspecified() {
        return candidate;
    }
    match control_local {
        Some(local) if !local.is_unspecified() && (candidate.is_ipv6() || local.is_ipv4()) => {
            local
        }
        _ => candidate,
    }
}

/// Run one detection attempt for `config`.
pub async fn detect(config: ProbeConfig) -> ProbeReport {
    ProbeSession::new(config).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;
    use crate::server::RendezvousServer;
    use crate::types::Peer;
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
    use std::time::Duration;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn spawn_server(listen: SocketAddr) -> SocketAddr {
        let settings = ServerSettings {
            listen,
            step_timeout_secs: 2,
            ..ServerSettings::default()
        };
        let server = RendezvousServer::bind(settings).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    /// A fake server that reads the announcement, replies with `reply`,
    /// and never connects back.
    async fn spawn_scripted_server(reply: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = protocol::read_message(&mut stream).await;
            let _ = protocol::write_message(&mut stream, reply).await;
            // Keep the control connection open past the ack.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        addr
    }

    fn config(server: SocketAddr, client_ip: IpAddr, timeout: Duration) -> ProbeConfig {
        ProbeConfig::new(server.ip().to_string(), server.port(), timeout, client_ip)
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let server = spawn_server("127.0.0.1:0".parse().unwrap()).await;
        let report = detect(config(server, LOCALHOST, Duration::from_secs(5))).await;

        assert_eq!(report.outcome, DetectionOutcome::Success, "{:?}", report.detail);
        let announced = report.announced.unwrap();
        assert_eq!(announced.ip(), LOCALHOST);
        assert_ne!(announced.port(), 0);
        assert!(report.is_reachable());
    }

    #[tokio::test]
    async fn test_end_to_end_ipv6() {
        // Skip on hosts without IPv6 loopback.
        if TcpListener::bind("[::1]:0").await.is_err() {
            return;
        }
        let server = spawn_server("[::1]:0".parse().unwrap()).await;
        let client_ip = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let report = detect(config(server, client_ip, Duration::from_secs(5))).await;

        assert_eq!(report.outcome, DetectionOutcome::Success, "{:?}", report.detail);
        assert!(report.announced.unwrap().to_string().starts_with("[::1]:"));
    }

    #[tokio::test]
    async fn test_wildcard_candidate_announces_concrete_address() {
        let server = spawn_server("127.0.0.1:0".parse().unwrap()).await;
        let report = detect(config(
            server,
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Duration::from_secs(5),
        ))
        .await;

        assert_eq!(report.outcome, DetectionOutcome::Success, "{:?}", report.detail);
        assert_eq!(report.announced.unwrap().ip(), LOCALHOST);
    }

    #[tokio::test]
    async fn test_bind_failed() {
        let server = spawn_server("127.0.0.1:0".parse().unwrap()).await;
        let report = detect(config(
            server,
            "192.0.2.1".parse().unwrap(),
            Duration::from_secs(1),
        ))
        .await;

        assert_eq!(report.outcome, DetectionOutcome::BindFailed);
        assert!(report.announced.is_none());
    }

    #[tokio::test]
    async fn test_server_unreachable() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = closed.local_addr().unwrap();
        drop(closed);

        let report = detect(config(server, LOCALHOST, Duration::from_secs(1))).await;
        assert_eq!(report.outcome, DetectionOutcome::ConnectFailed(Peer::Server));
    }

    #[tokio::test]
    async fn test_server_cannot_connect_back() {
        let server = spawn_scripted_server("ERROR: Cannot connect to specified address").await;

        let start = Instant::now();
        let report = detect(config(server, LOCALHOST, Duration::from_secs(10))).await;

        assert_eq!(
            report.outcome,
            DetectionOutcome::ProtocolError(
                "ERROR: Cannot connect to specified address".to_string()
            )
        );
        // No callback wait happens on a rejection.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_callback_timeout() {
        let server = spawn_scripted_server("SUCCESS: Random value sent").await;
        let wait = Duration::from_secs(2);

        let mut session = ProbeSession::new(config(server, LOCALHOST, wait));
        let start = Instant::now();
        let result = session.drive().await;
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(ProbeError::CallbackTimeout(_))));
        assert!(elapsed >= wait, "returned early after {:?}", elapsed);
        assert!(elapsed < wait + Duration::from_secs(2), "took {:?}", elapsed);

        // The listener was released: its port no longer accepts.
        let port = session.announced.unwrap().port();
        assert!(TcpStream::connect((LOCALHOST, port)).await.is_err());
    }

    #[tokio::test]
    async fn test_response_wait_follows_config() {
        // Accepts the control connection and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = config(server, LOCALHOST, Duration::from_secs(10))
            .with_response_timeout(Duration::from_secs(1));
        let start = Instant::now();
        let report = detect(config).await;

        assert!(matches!(report.outcome, DetectionOutcome::ProtocolError(_)));
        assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_unexpected_response_is_protocol_error() {
        let server = spawn_scripted_server("HELLO").await;
        let report = detect(config(server, LOCALHOST, Duration::from_secs(1))).await;
        assert_eq!(
            report.outcome,
            DetectionOutcome::ProtocolError("HELLO".to_string())
        );
    }

    #[tokio::test]
    async fn test_session_states() {
        let server = spawn_server("127.0.0.1:0".parse().unwrap()).await;
        let mut session = ProbeSession::new(config(server, LOCALHOST, Duration::from_secs(5)));
        assert_eq!(session.state(), &ProbeState::Init);
        assert!(!session.state().is_terminal());

        session.drive().await.unwrap();
        assert_eq!(session.state(), &ProbeState::AwaitingCallback);
    }

    #[test]
    fn test_announce_ip_substitution() {
        let any4 = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let any6 = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
        let v4: IpAddr = "198.51.100.7".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(announce_ip(v4, Some(v6)), v4);
        assert_eq!(announce_ip(any4, Some(v4)), v4);
        assert_eq!(announce_ip(any6, Some(v6)), v6);
        assert_eq!(announce_ip(any6, Some(v4)), v4);
        assert_eq!(announce_ip(any4, Some(v6)), any4);
        assert_eq!(announce_ip(any4, None), any4);
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_terminal_transition_logged_with_attempt_id() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let session = ProbeSession::new(ProbeConfig::new(
            "127.0.0.1",
            1,
            Duration::from_secs(1),
            "192.0.2.1".parse().unwrap(),
        ));
        let id = session.id().short();
        let report = session.run().await;
        assert_eq!(report.outcome, DetectionOutcome::BindFailed);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let terminal = output
            .lines()
            .find(|line| line.contains("to=Failed"))
            .expect("terminal transition not logged");
        assert!(terminal.contains(&format!("id={}", id)), "{}", terminal);
    }
}
