//! `QuizServer` builder, server loop, and graceful shutdown.
//!
//! This is the entry point for running a Quizforge server. It ties
//! together all the layers: transport → protocol → directory → session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use quizforge_protocol::{Codec, JsonCodec};
use quizforge_session::{QuestionBank, QuizConfig, SessionRegistry};
use quizforge_transport::{Transport, WebSocketTransport};
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::router::SERVER_RESTARTING;
use crate::{QuizforgeError, Router};

/// Network-facing settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// How long shutdown waits for connections to flush and close.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Builder for configuring and starting a Quizforge server.
///
/// # Example
///
/// ```rust,ignore
/// use quizforge::prelude::*;
///
/// let server = QuizServer::builder()
///     .bind("0.0.0.0:8080")
///     .bank(QuestionBank::default())
///     .build()
///     .await?;
/// server.run_until(tokio::signal::ctrl_c()).await
/// ```
pub struct QuizServerBuilder {
    server: ServerConfig,
    quiz: QuizConfig,
    bank: QuestionBank,
}

impl QuizServerBuilder {
    /// Creates a new builder with default settings and the built-in bank.
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            quiz: QuizConfig::default(),
            bank: QuestionBank::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.server.bind_addr = addr.to_string();
        self
    }

    /// Sets the network configuration.
    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server = config;
        self
    }

    /// Sets quiz timings and sizes.
    pub fn quiz_config(mut self, config: QuizConfig) -> Self {
        self.quiz = config;
        self
    }

    /// Sets the question bank games draw from.
    pub fn bank(mut self, bank: QuestionBank) -> Self {
        self.bank = bank;
        self
    }

    /// Binds the listener and starts the session registry.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<QuizServer<JsonCodec>, QuizforgeError> {
        let transport = WebSocketTransport::bind(&self.server.bind_addr).await?;
        let registry = SessionRegistry::new(self.quiz, self.bank);

        Ok(QuizServer {
            transport,
            router: Arc::new(Router::new(JsonCodec, registry)),
            shutdown_grace: self.server.shutdown_grace,
        })
    }
}

impl Default for QuizServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Quizforge server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct QuizServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    router: Arc<Router<C>>,
    shutdown_grace: Duration,
}

impl QuizServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> QuizServerBuilder {
        QuizServerBuilder::new()
    }
}

impl<C: Codec> QuizServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The router shared by every connection.
    pub fn router(&self) -> Arc<Router<C>> {
        Arc::clone(&self.router)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), QuizforgeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then shuts down
    /// gracefully.
    ///
    /// Shutdown sends `serverShutdown` to every connection, closes them,
    /// stops every session, and waits up to the configured grace period
    /// for connection tasks to finish.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), QuizforgeError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Quizforge server running");

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let router = Arc::clone(&self.router);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(conn, router).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                // Reap finished handlers so the set doesn't grow unbounded.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(connections = connections.len(), "shutting down");
        self.router.shutdown(SERVER_RESTARTING).await;

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "connections still open after grace period, aborting"
            );
            connections.shutdown().await;
        }

        tracing::info!("Quizforge server stopped");
        Ok(())
    }
}
