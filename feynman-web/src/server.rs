//! Feynman Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use feynman_rag::RagConfig;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main Feynman web server
pub struct FeynmanServer {
    config: WebConfig,
    state: AppState,
}

impl FeynmanServer {
    /// Create a new server
    pub fn new(config: WebConfig, rag_config: RagConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone(), rag_config)?;

        Ok(Self { config, state })
    }

    /// Start the web server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("Starting Feynman web server");
        info!("Server address: http://{}", address);
        info!("Development mode: {}", self.config.dev_mode);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for FeynmanServer
pub struct FeynmanServerBuilder {
    config: WebConfig,
    rag_config: RagConfig,
}

impl FeynmanServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
            rag_config: RagConfig::default(),
        }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable development mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    /// Set the pipeline configuration
    pub fn rag_config(mut self, rag_config: RagConfig) -> Self {
        self.rag_config = rag_config;
        self
    }

    /// Build the server
    pub fn build(self) -> WebResult<FeynmanServer> {
        FeynmanServer::new(self.config, self.rag_config)
    }
}

impl Default for FeynmanServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to start a server configured from the environment
pub async fn start_server() -> WebResult<()> {
    let config = WebConfig::from_env();
    let rag_config = RagConfig::from_env();
    rag_config
        .validate()
        .map_err(|e| WebError::Config(e.to_string()))?;
    let server = FeynmanServer::new(config, rag_config)?;
    server.start().await
}
