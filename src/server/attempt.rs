//! One server-side callback attempt.
//!
//! Processes a single accepted control connection to completion:
//! read the announcement, decode it, connect back to the announced
//! address, push a token, and report the result on the control connection.

use crate::config::ServerSettings;
use crate::error::AttemptError;
use crate::protocol::{self, Response};
use crate::types::{AddressSpec, Announcement, DetectionOutcome, Token, TokenGenerator};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// State of a callback attempt, for logging transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Accepted,
    Parsing,
    ConnectingBack,
    Verified,
    Failed,
    Responded,
}

/// A callback attempt driven by one control connection.
pub struct CallbackAttempt<'a> {
    peer: SocketAddr,
    tokens: &'a TokenGenerator,
    step_timeout: Duration,
    state: AttemptState,
    announced: Option<AddressSpec>,
    token: Option<Token>,
}

impl<'a> CallbackAttempt<'a> {
    /// Start an attempt for a connection accepted from `peer`.
    pub fn new(peer: SocketAddr, tokens: &'a TokenGenerator, settings: &ServerSettings) -> Self {
        Self {
            peer,
            tokens,
            step_timeout: settings.step_timeout(),
            state: AttemptState::Accepted,
            announced: None,
            token: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// The decoded announcement, once parsed.
    pub fn announced(&self) -> Option<AddressSpec> {
        self.announced
    }

    /// The token sent to the target, once verified.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    fn transition(&mut self, next: AttemptState) {
        debug!(peer = %self.peer, from = ?self.state, to = ?next, "attempt state");
        self.state = next;
    }

    /// Run the attempt on `control` and close it.
    ///
    /// Every failure is turned into an error response; the returned
    /// outcome is informational only.
    pub async fn run<S>(mut self, mut control: S) -> DetectionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.verify(&mut control).await;

        let response = match &result {
            Ok(()) => Response::Success,
            Err(e) => {
                self.transition(AttemptState::Failed);
                warn!(peer = %self.peer, error = %e, "callback attempt failed");
                e.response()
            }
        };

        match timeout(
            self.step_timeout,
            protocol::write_message(&mut control, response.as_str()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(peer = %self.peer, error = %e, "failed to send response"),
            Err(_) => debug!(peer = %self.peer, "timed out sending response"),
        }
        let _ = control.shutdown().await;
        self.transition(AttemptState::Responded);

        match result {
            Ok(()) => DetectionOutcome::Success,
            Err(e) => e.outcome(),
        }
    }

    async fn verify<S>(&mut self, control: &mut S) -> Result<(), AttemptError>
    where
        S: AsyncRead + Unpin,
    {
        let text = match timeout(self.step_timeout, protocol::read_message(&mut *control)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(AttemptError::ReadFailed(e.to_string())),
            Err(_) => {
                return Err(AttemptError::ReadFailed(format!(
                    "no announcement within {:?}",
                    self.step_timeout
                )))
            }
        };
        if text.is_empty() {
            return Err(AttemptError::ReadFailed("empty announcement".to_string()));
        }
        debug!(peer = %self.peer, announcement = %text, "received announcement");

        self.transition(AttemptState::Parsing);
        let announcement = Announcement::parse(&text).map_err(|source| {
            AttemptError::ParseFailed {
                text: text.clone(),
                source,
            }
        })?;
        let target = announcement.address();
        self.announced = Some(target);

        self.transition(AttemptState::ConnectingBack);
        let mut stream = self.connect_back(target).await?;

        let token = self.tokens.generate();
        let write = async {
            stream.write_all(token.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        match timeout(self.step_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(AttemptError::SendFailed {
                    target: target.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(AttemptError::SendFailed {
                    target: target.to_string(),
                    reason: format!("write timed out after {:?}", self.step_timeout),
                })
            }
        }
        drop(stream);

        info!(peer = %self.peer, target = %target, "token delivered");
        self.token = Some(token);
        self.transition(AttemptState::Verified);
        Ok(())
    }

    async fn connect_back(&self, target: AddressSpec) -> Result<TcpStream, AttemptError> {
        debug!(target = %target, "connecting back");
        match timeout(self.step_timeout, TcpStream::connect(target.socket_addr())).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(AttemptError::ConnectFailed {
                target: target.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AttemptError::ConnectFailed {
                target: target.to_string(),
                reason: format!("connect timed out after {:?}", self.step_timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Peer;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn settings() -> ServerSettings {
        ServerSettings {
            step_timeout_secs: 1,
            ..ServerSettings::default()
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    /// Runs an attempt over an in-memory control channel and returns the
    /// outcome plus the response text the client would see.
    async fn run_with_announcement(text: &[u8]) -> (DetectionOutcome, String) {
        let tokens = TokenGenerator::default();
        let settings = settings();
        let (mut client, server) = tokio::io::duplex(4096);
        client.write_all(text).await.unwrap();
        client.shutdown().await.unwrap();

        let attempt = CallbackAttempt::new(peer(), &tokens, &settings);
        let outcome = attempt.run(server).await;

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        (outcome, response)
    }

    #[tokio::test]
    async fn test_invalid_address_format() {
        let (outcome, response) = run_with_announcement(b"not-an-address\n").await;
        assert_eq!(response, "ERROR: Invalid address format\n");
        assert!(matches!(outcome, DetectionOutcome::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_empty_announcement() {
        let (_, response) = run_with_announcement(b"").await;
        assert_eq!(response, "ERROR: Invalid address format\n");
    }

    #[tokio::test]
    async fn test_unspecified_announcement_rejected() {
        let (_, response) = run_with_announcement(b"0.0.0.0:5000\n").await;
        assert_eq!(response, "ERROR: Invalid address format\n");
    }

    #[tokio::test]
    async fn test_cannot_connect_back() {
        // Grab a free port, then close it so the connect-back is refused.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let (outcome, response) =
            run_with_announcement(format!("{}\n", AddressSpec::from(addr)).as_bytes()).await;
        assert_eq!(response, "ERROR: Cannot connect to specified address\n");
        assert_eq!(outcome, DetectionOutcome::ConnectFailed(Peer::Target));
    }

    #[tokio::test]
    async fn test_token_delivered() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = target.local_addr().unwrap();

        let receiver = tokio::spawn(async move {
            let (mut stream, _) = target.accept().await.unwrap();
            let mut token = String::new();
            stream.read_to_string(&mut token).await.unwrap();
            token
        });

        let (outcome, response) =
            run_with_announcement(format!("{}\n", AddressSpec::from(addr)).as_bytes()).await;
        assert_eq!(outcome, DetectionOutcome::Success);
        assert_eq!(response, "SUCCESS: Random value sent\n");

        let token = receiver.await.unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_attempt_records_state() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = target.local_addr().unwrap();
        let accept = tokio::spawn(async move { target.accept().await.map(|_| ()) });

        let tokens = TokenGenerator::new(8);
        let settings = settings();
        let (mut client, mut server) = tokio::io::duplex(1024);
        client
            .write_all(format!("{}\n", AddressSpec::from(addr)).as_bytes())
            .await
            .unwrap();

        let mut attempt = CallbackAttempt::new(peer(), &tokens, &settings);
        assert_eq!(attempt.state(), AttemptState::Accepted);
        attempt.verify(&mut server).await.unwrap();
        assert_eq!(attempt.state(), AttemptState::Verified);
        assert_eq!(attempt.announced(), Some(AddressSpec::from(addr)));
        assert_eq!(attempt.token().map(Token::len), Some(8));
        accept.await.unwrap().unwrap();
    }
}
