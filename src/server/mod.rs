//! Rendezvous server - accepts announcements and connects back to them.
//!
//! Each accepted control connection becomes an independent
//! [`CallbackAttempt`] running on its own tokio task. Attempts share
//! nothing but the token generator, and a semaphore bounds how many run
//! at once.

mod attempt;

pub use attempt::{AttemptState, CallbackAttempt};

use crate::config::ServerSettings;
use crate::probe::RESPONSE_TIMEOUT;
use crate::types::{AttemptId, TokenGenerator};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Default rendezvous port.
pub const DEFAULT_PORT: u16 = 8066;

/// A bound rendezvous server.
pub struct RendezvousServer {
    listener: TcpListener,
    tokens: Arc<TokenGenerator>,
    settings: Arc<ServerSettings>,
}

impl RendezvousServer {
    /// Bind the listening socket described by `settings`.
    pub async fn bind(settings: ServerSettings) -> io::Result<Self> {
        let listener = TcpListener::bind(settings.listen).await?;
        let tokens = TokenGenerator::new(settings.token_length);
        Ok(Self::from_listener(listener, tokens, settings))
    }

    /// Build a server around an already bound listener.
    pub fn from_listener(
        listener: TcpListener,
        tokens: TokenGenerator,
        settings: ServerSettings,
    ) -> Self {
        Self {
            listener,
            tokens: Arc::new(tokens),
            settings: Arc::new(settings),
        }
    }

    /// Address the server is accepting on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Attempts already in flight keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let workers = Arc::new(Semaphore::new(self.settings.max_workers.max(1)));
        info!(
            addr = %self.listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            max_workers = self.settings.max_workers,
            "rendezvous server listening"
        );
        let bound = self.settings.response_delay_bound();
        if bound >= RESPONSE_TIMEOUT {
            warn!(
                bound = ?bound,
                client_default = ?RESPONSE_TIMEOUT,
                "step timeout lets responses outlast the default client wait"
            );
        }

        tokio::pin!(shutdown);
        loop {
            // Accepting waits for a free worker.
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&workers).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let tokens = Arc::clone(&self.tokens);
            let settings = Arc::clone(&self.settings);
            let id = AttemptId::new();
            let span = info_span!("attempt", id = %id.short(), peer = %peer);

            tokio::spawn(
                async move {
                    debug!("client connected");
                    let outcome = CallbackAttempt::new(peer, &tokens, &settings)
                        .run(stream)
                        .await;
                    info!(outcome = outcome.label(), "connection closed");
                    drop(permit);
                }
                .instrument(span),
            );
        }

        info!("rendezvous server stopped");
    }
}
