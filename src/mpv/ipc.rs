//! Async IPC connection to MPV over its Unix socket.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::Sender;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::protocol::{MpvCommand, MpvEvent, MpvMessage, MpvResponse};
use crate::error::ErrorKind;
use crate::retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),
  #[error("Write failed: {0}")]
  WriteFailed(#[from] std::io::Error),
  #[error("Command timeout")]
  Timeout,
  #[error("Disconnected")]
  Disconnected,
}

impl IpcError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      IpcError::ConnectionFailed(_) | IpcError::Disconnected => ErrorKind::StaleChannel,
      IpcError::WriteFailed(_) => ErrorKind::Io,
      IpcError::Timeout => ErrorKind::Timeout,
    }
  }
}

type PendingRequest = oneshot::Sender<Result<MpvResponse, IpcError>>;

enum WriteMessage {
  Command(Vec<u8>),
  Close,
}

/// One connection to the MPV socket.
///
/// Events are forwarded into a sender owned by the caller so that a
/// reconnect keeps feeding the same stream.
pub struct MpvIpc {
  pending: Arc<Mutex<HashMap<i64, PendingRequest>>>,
  closed: Arc<AtomicBool>,
  write_tx: Sender<WriteMessage>,
  command_timeout: Duration,
  _reader_handle: JoinHandle<()>,
  _writer_handle: JoinHandle<()>,
}

impl MpvIpc {
  /// Connect to the socket, retrying according to `policy`.
  pub async fn connect(
    path: &Path,
    policy: &RetryPolicy<IpcError>,
    events: Sender<MpvEvent>,
    command_timeout: Duration,
  ) -> Result<Self, IpcError> {
    let stream = policy
      .run("mpv ipc connect", |_| async move {
        UnixStream::connect(path)
          .await
          .map_err(|e| IpcError::ConnectionFailed(format!("{}: {}", path.display(), e)))
      })
      .await?;
    log::info!("Connected to MPV IPC at {:?}", path);
    Ok(Self::setup(stream, events, command_timeout))
  }

  fn setup(stream: UnixStream, events: Sender<MpvEvent>, command_timeout: Duration) -> Self {
    let (reader, writer) = stream.into_split();
    let pending = Arc::new(Mutex::new(HashMap::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let (write_tx, write_rx) = async_channel::unbounded::<WriteMessage>();

    let reader_pending = pending.clone();
    let reader_closed = closed.clone();
    let reader_handle = tokio::spawn(async move {
      Self::reader_loop(reader, reader_pending, events).await;
      reader_closed.store(true, Ordering::SeqCst);
    });

    let writer_handle = tokio::spawn(async move {
      Self::writer_loop(writer, write_rx).await;
    });

    Self {
      pending,
      closed,
      write_tx,
      command_timeout,
      _reader_handle: reader_handle,
      _writer_handle: writer_handle,
    }
  }

  async fn reader_loop<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    pending: Arc<Mutex<HashMap<i64, PendingRequest>>>,
    events: Sender<MpvEvent>,
  ) {
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
      line.clear();
      match buf_reader.read_line(&mut line).await {
        Ok(0) => {
          log::info!("MPV IPC connection closed");
          break;
        }
        Ok(_) => {
          let trimmed = line.trim();
          if trimmed.is_empty() {
            continue;
          }

          match MpvMessage::parse(trimmed) {
            Ok(MpvMessage::Response(response)) => {
              if let Some(tx) = pending.lock().remove(&response.request_id) {
                let _ = tx.send(Ok(response));
              }
            }
            Ok(MpvMessage::Event(event)) => {
              log::debug!("MPV event {:?}", event);
              let _ = events.send(event).await;
            }
            Err(e) => {
              log::warn!("Failed to parse MPV message: {} - {}", e, trimmed);
            }
          }
        }
        Err(e) => {
          log::error!("MPV IPC read error: {}", e);
          break;
        }
      }
    }

    // Fail everything still waiting instead of letting it run into the timeout.
    for (_, tx) in pending.lock().drain() {
      let _ = tx.send(Err(IpcError::Disconnected));
    }
  }

  async fn writer_loop<W: tokio::io::AsyncWrite + Unpin>(
    mut writer: W,
    write_rx: async_channel::Receiver<WriteMessage>,
  ) {
    while let Ok(msg) = write_rx.recv().await {
      match msg {
        WriteMessage::Command(mut data) => {
          data.push(b'\n');
          if let Err(e) = writer.write_all(&data).await {
            log::error!("MPV IPC write error: {}", e);
            break;
          }
          if let Err(e) = writer.flush().await {
            log::error!("MPV IPC flush error: {}", e);
            break;
          }
        }
        WriteMessage::Close => {
          log::debug!("MPV IPC writer closing");
          break;
        }
      }
    }
  }

  /// Whether the reader has seen the connection go away.
  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst) || self.write_tx.is_closed()
  }

  /// Send a command to MPV and wait for its response.
  pub async fn send_command(&self, cmd: MpvCommand) -> Result<MpvResponse, IpcError> {
    if self.is_closed() {
      return Err(IpcError::Disconnected);
    }

    let request_id = cmd.request_id;
    let (tx, rx) = oneshot::channel();
    self.pending.lock().insert(request_id, tx);

    let json = serde_json::to_string(&cmd).map_err(|e| IpcError::WriteFailed(e.into()))?;
    log::debug!("Sending MPV command: {}", json);

    if self
      .write_tx
      .send(WriteMessage::Command(json.into_bytes()))
      .await
      .is_err()
    {
      self.pending.lock().remove(&request_id);
      return Err(IpcError::Disconnected);
    }

    match tokio::time::timeout(self.command_timeout, rx).await {
      Ok(Ok(result)) => result,
      Ok(Err(_)) => Err(IpcError::Disconnected),
      Err(_) => {
        log::warn!(
          "MPV command timed out after {:?}, request_id={}",
          self.command_timeout,
          request_id
        );
        self.pending.lock().remove(&request_id);
        Err(IpcError::Timeout)
      }
    }
  }

  /// Close the connection.
  pub fn close(&self) {
    let _ = self.write_tx.try_send(WriteMessage::Close);
  }
}
