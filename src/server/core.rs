use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::capture::CaptureLog;
use crate::client::{ClientRegistry, handle_client};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::error::handlers::report_session_end;
use crate::relay::Dispatcher;

pub struct Server {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    capture: Arc<CaptureLog>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Binds the listener and opens the capture log if one is configured.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let socket = config.socket_addr();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => {
                info!("Server bound to {}", socket);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e.into());
            }
        };

        let capture = Arc::new(CaptureLog::from_path(config.capture_path.as_deref()).await?);
        let registry = Arc::new(ClientRegistry::new(config.max_clients));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&capture),
        ));

        Ok(Self {
            listener,
            registry,
            dispatcher,
            capture,
            config: Arc::new(config),
        })
    }

    /// Address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Accepts connections forever. Failures are confined to the connection they occur on.
    pub async fn start(&self) {
        info!(
            "Starting N3FJP relay on {} (max {} clients, capture {})",
            self.config.socket_addr(),
            self.config.max_clients,
            if self.capture.is_enabled() { "on" } else { "off" }
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_session(stream, addr),
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let capture = Arc::clone(&self.capture);
        let config = Arc::clone(&self.config);

        // Spawn a task for each client so accept loop doesn't block
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, addr, dispatcher, capture, config).await {
                report_session_end(addr, &e);
            }
        });
    }
}
