//! Persistent stream connection to an external policy process
//!
//! The connection is split into a writer task draining an outbound frame
//! queue and a reader task collecting inbound action ids. The decision
//! cycle only touches the two queues, so sending never blocks and receiving
//! is a poll. Any read or write failure marks the connection dead; there
//! is no reconnect.

use arena_rl_core::protocol::{self, Handshake, TransitionMessage};
use arena_rl_core::{ArenaError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;

/// How long [`Transport::close`] waits for queued frames to flush
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Framed connection with non-blocking send and receive
#[derive(Debug)]
pub struct Transport {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    inbound: mpsc::UnboundedReceiver<u32>,
    connected: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl Transport {
    /// Connect to the configured endpoint, optionally exchange the
    /// informational handshake, and start the I/O tasks
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let address = config.address();
        let wait = duration(config.connect_timeout, "connect timeout")?;
        let mut stream = tokio::time::timeout(wait, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                ArenaError::Transport(format!(
                    "connect to {address} timed out after {}s",
                    config.connect_timeout
                ))
            })?
            .map_err(|e| ArenaError::Transport(format!("connect to {address} failed: {e}")))?;
        stream.set_nodelay(true)?;
        info!(%address, "connected to policy server");

        if config.handshake {
            handshake(&mut stream, config.handshake_timeout).await?;
        }
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream. Must be called inside a tokio
    /// runtime.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let connected = Arc::new(AtomicBool::new(true));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<u32>();

        let writer_flag = Arc::clone(&connected);
        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let sent = async {
                    write_half.write_all(&frame).await?;
                    write_half.flush().await
                };
                if let Err(e) = sent.await {
                    warn!(error = %e, "send failed, marking connection dead");
                    writer_flag.store(false, Ordering::SeqCst);
                    return;
                }
            }
            if let Err(e) = write_half.shutdown().await {
                debug!(error = %e, "shutdown of outbound half failed");
            }
        });

        let reader_flag = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            loop {
                match protocol::read_action_id(&mut read_half).await {
                    Ok(id) => {
                        debug!(id, "received action id");
                        if in_tx.send(id).is_err() {
                            break;
                        }
                    }
                    Err(ArenaError::Disconnected) => {
                        info!("policy server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "receive failed, marking connection dead");
                        break;
                    }
                }
            }
            reader_flag.store(false, Ordering::SeqCst);
        });

        Self {
            outbound: Some(out_tx),
            inbound: in_rx,
            connected,
            writer: Some(writer),
            reader,
        }
    }

    /// Whether both directions are still usable
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.outbound.is_some() && self.connected.load(Ordering::SeqCst)
    }

    /// Queue one transition frame. Does not wait for it to be written.
    pub fn send_transition(&self, message: &TransitionMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(ArenaError::Disconnected);
        }
        let frame = protocol::encode_json(message)?;
        self.outbound
            .as_ref()
            .ok_or(ArenaError::Disconnected)?
            .send(frame)
            .map_err(|_| ArenaError::Disconnected)
    }

    /// Oldest pending action id, if any. Ids received before a disconnect
    /// are still delivered; after that the call fails with
    /// [`ArenaError::Disconnected`].
    pub fn try_recv_action_id(&mut self) -> Result<Option<u32>> {
        match self.inbound.try_recv() {
            Ok(id) => Ok(Some(id)),
            Err(TryRecvError::Empty) if self.connected.load(Ordering::SeqCst) => Ok(None),
            Err(_) => Err(ArenaError::Disconnected),
        }
    }

    /// Flush queued frames and close the connection
    pub async fn close(&mut self) {
        self.outbound.take();
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, writer).await.is_err() {
                warn!("timed out flushing outbound frames");
            }
        }
        self.reader.abort();
        self.connected.store(false, Ordering::SeqCst);
        debug!("transport closed");
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(writer) = &self.writer {
            writer.abort();
        }
        self.reader.abort();
    }
}

fn duration(seconds: f32, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f32(seconds)
        .map_err(|e| ArenaError::Transport(format!("invalid {what} {seconds}s: {e}")))
}

async fn handshake(stream: &mut TcpStream, timeout_secs: f32) -> Result<()> {
    let wait = duration(timeout_secs, "handshake timeout")?;
    let payload = serde_json::to_vec(&Handshake::default())?;
    protocol::write_frame(stream, &payload).await?;

    let reply = tokio::time::timeout(wait, protocol::read_frame(stream))
        .await
        .map_err(|_| ArenaError::Transport(format!("no handshake reply within {timeout_secs}s")))??;
    info!(reply = %String::from_utf8_lossy(&reply), "handshake reply");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_rl_core::protocol::{decode_frame, decode_transition};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn recv_id(transport: &mut Transport) -> Option<u32> {
        for _ in 0..200 {
            if let Some(id) = transport.try_recv_action_id().unwrap() {
                return Some(id);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn frames_out_and_ids_in() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = Transport::from_stream(client);
        assert_eq!(transport.try_recv_action_id().unwrap(), None);

        let message = TransitionMessage {
            state: [1.0; 8],
            reward: 0.5,
            done: false,
        };
        transport.send_transition(&message).unwrap();

        let payload = protocol::read_frame(&mut server).await.unwrap();
        assert_eq!(decode_transition(&payload).unwrap(), message);

        protocol::write_action_id(&mut server, 2).await.unwrap();
        protocol::write_action_id(&mut server, 0).await.unwrap();
        assert_eq!(recv_id(&mut transport).await, Some(2));
        assert_eq!(recv_id(&mut transport).await, Some(0));
    }

    #[tokio::test]
    async fn peer_close_marks_dead() {
        let (client, server) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(client);
        drop(server);

        for _ in 0..200 {
            if !transport.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!transport.is_connected());
        assert!(transport.try_recv_action_id().is_err());
        assert!(transport
            .send_transition(&TransitionMessage {
                state: [0.0; 8],
                reward: 0.0,
                done: true,
            })
            .is_err());
    }

    #[tokio::test]
    async fn connect_with_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let hello = protocol::read_frame(&mut socket).await.unwrap();
            let hello: serde_json::Value = serde_json::from_slice(&hello).unwrap();
            protocol::write_frame(&mut socket, br#"{"pong":"ok"}"#).await.unwrap();
            let mut rest = Vec::new();
            socket.read_to_end(&mut rest).await.unwrap();
            (hello, rest)
        });

        let config = RemoteConfig {
            port,
            ..RemoteConfig::default()
        };
        let mut transport = Transport::connect(&config).await.unwrap();
        transport
            .send_transition(&TransitionMessage {
                state: [0.0; 8],
                reward: 1.0,
                done: true,
            })
            .unwrap();
        transport.close().await;

        let (hello, rest) = server.await.unwrap();
        assert_eq!(hello["NumStates"], "8");
        assert_eq!(hello["NumActions"], "5");
        let (payload, _) = decode_frame(&rest).unwrap().unwrap();
        assert!(decode_transition(payload).unwrap().done);
    }

    #[tokio::test]
    async fn unusable_timeouts_fail_the_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let config = RemoteConfig {
            port,
            handshake_timeout: f32::INFINITY,
            ..RemoteConfig::default()
        };
        assert!(matches!(
            Transport::connect(&config).await,
            Err(ArenaError::Transport(_))
        ));
        server.await.unwrap();

        let config = RemoteConfig {
            port,
            connect_timeout: f32::NAN,
            ..RemoteConfig::default()
        };
        assert!(matches!(
            Transport::connect(&config).await,
            Err(ArenaError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn silent_handshake_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _hello = protocol::read_frame(&mut socket).await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let config = RemoteConfig {
            port,
            handshake_timeout: 0.05,
            ..RemoteConfig::default()
        };
        assert!(matches!(
            Transport::connect(&config).await,
            Err(ArenaError::Transport(_))
        ));
        server.abort();
    }

    #[tokio::test]
    async fn connect_failure_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = RemoteConfig {
            port,
            ..RemoteConfig::default()
        };
        assert!(matches!(
            Transport::connect(&config).await,
            Err(ArenaError::Transport(_))
        ));
    }
}
