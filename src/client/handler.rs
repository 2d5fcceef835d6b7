use log::{debug, info, trace, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::capture::CaptureLog;
use crate::client::registry::Frame;
use crate::client::session::Session;
use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::relay::Dispatcher;

const READ_CHUNK: usize = 4096;

/// Runs one client connection until it closes, stalls, or fails.
///
/// - Registers the client, then queues the greeting before reading anything.
/// - A writer task drains the client's outbound queue; the reader feeds the
///   framer and dispatches complete messages in arrival order.
/// - Whichever side stops first ends the session, and the registry entry is
///   removed on every exit path after registration.
pub async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    capture: Arc<CaptureLog>,
    config: Arc<ServerConfig>,
) -> Result<()> {
    let registry = Arc::clone(dispatcher.registry());
    let (read_half, write_half) = stream.into_split();
    let (outbound, queue) = mpsc::channel(config.outbound_queue_depth);

    // A refused connection is dropped before the greeting is queued.
    let count = registry.register(addr, outbound).await?;
    info!(
        "Client connected: {} ({}/{} clients)",
        addr, count, config.max_clients
    );

    let mut writer = tokio::spawn(write_loop(write_half, queue, addr, config.write_timeout()));
    dispatcher.greet(addr).await;

    let mut session = Session::new(addr, config.max_buffer_bytes, config.max_idle_reads);
    let (outcome, writer_done) = tokio::select! {
        result = read_loop(read_half, &mut session, &dispatcher, &capture, &config) => (result, false),
        joined = &mut writer => {
            let result = match joined {
                Ok(Err(e)) => Err(e),
                _ => Err(RelayError::WriterStopped),
            };
            (result, true)
        }
    };
    session.close();

    registry.unregister(&addr).await;
    info!(
        "Client {} unregistered ({} clients remaining)",
        addr,
        registry.len().await
    );

    // Let already queued replies go out before the socket is dropped.
    if !writer_done && timeout(config.write_timeout(), &mut writer).await.is_err() {
        debug!("Writer for {} still busy, aborting", addr);
        writer.abort();
    }

    outcome
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    session: &mut Session,
    dispatcher: &Dispatcher,
    capture: &CaptureLog,
    config: &ServerConfig,
) -> Result<()> {
    let addr = session.addr();
    let mut buffer = [0u8; READ_CHUNK];

    loop {
        let n = match timeout(config.read_timeout(), reader.read(&mut buffer)).await {
            Ok(result) => result?,
            Err(_) => return Err(RelayError::ReadTimeout(config.read_timeout_secs)),
        };

        if n == 0 {
            debug!("Empty read from {}", addr);
        } else {
            trace!("Received {} bytes from {}", n, addr);
            capture.raw(addr, &buffer[..n]).await;
        }

        let bodies = session.receive(&buffer[..n])?;
        if !bodies.is_empty() {
            debug!(
                "Extracted {} messages from {}, {} bytes pending",
                bodies.len(),
                addr,
                session.pending_bytes()
            );
        }

        for body in bodies {
            capture.message(addr, &body).await;
            dispatcher.dispatch(addr, &body).await;
        }
    }
}

/// Drains a client's outbound queue onto its socket, one bounded write per frame.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Frame>,
    addr: SocketAddr,
    write_timeout: Duration,
) -> Result<()> {
    while let Some(frame) = queue.recv().await {
        match timeout(write_timeout, writer.write_all(&frame)).await {
            Ok(Ok(())) => trace!("Sent {} bytes to {}", frame.len(), addr),
            Ok(Err(e)) => {
                warn!("Send to {} failed: {}", addr, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Send to {} timed out after {:?}", addr, write_timeout);
                return Err(RelayError::WriterStopped);
            }
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}
