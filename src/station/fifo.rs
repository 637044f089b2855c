//! Control FIFO of the station player.
//!
//! A FIFO write blocks forever when nothing reads the other end, so every
//! delivery path is non-blocking or raced against a timeout.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ErrorKind;

const FIFO_MODE: u32 = 0o666;

#[derive(Error, Debug)]
pub enum FifoError {
  #[error("FIFO I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("{0:?} is a directory, refusing to replace it with a FIFO")]
  IsDirectory(PathBuf),
  #[error("No process is reading the FIFO")]
  NoReader,
  #[error("FIFO write timed out")]
  Timeout,
  #[error("Helper write failed: {0}")]
  Helper(String),
}

impl FifoError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      FifoError::Io(_) | FifoError::IsDirectory(_) => ErrorKind::Io,
      FifoError::NoReader => ErrorKind::ProcessNotFound,
      FifoError::Timeout => ErrorKind::Timeout,
      FifoError::Helper(_) => ErrorKind::External,
    }
  }
}

/// Named pipe the station player reads commands from.
#[derive(Debug, Clone)]
pub struct ControlFifo {
  path: PathBuf,
  timeout: Duration,
}

impl ControlFifo {
  pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
    Self {
      path: path.into(),
      timeout,
    }
  }

  /// Make sure a world read/write FIFO exists at the path.
  ///
  /// A regular file (or anything else that is not a FIFO) is removed and
  /// replaced; wrong permissions are corrected.
  pub fn ensure(&self) -> Result<(), FifoError> {
    match std::fs::symlink_metadata(&self.path) {
      Ok(meta) if meta.file_type().is_fifo() => {
        let mode = meta.permissions().mode() & 0o777;
        if mode != FIFO_MODE {
          log::info!("Fixing FIFO permissions {:o} -> {:o}", mode, FIFO_MODE);
          std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(FIFO_MODE))?;
        }
        return Ok(());
      }
      Ok(meta) if meta.is_dir() => return Err(FifoError::IsDirectory(self.path.clone())),
      Ok(_) => {
        log::warn!("{:?} exists but is not a FIFO, recreating it", self.path);
        std::fs::remove_file(&self.path)?;
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        log::info!("Creating control FIFO {:?}", self.path);
      }
      Err(e) => return Err(e.into()),
    }

    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let c_path = CString::new(self.path.as_os_str().as_bytes())
      .map_err(|e| FifoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE as libc::mode_t) };
    if rc != 0 {
      let err = std::io::Error::last_os_error();
      if err.kind() != std::io::ErrorKind::AlreadyExists {
        return Err(err.into());
      }
    }
    // mkfifo honours the umask.
    std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(FIFO_MODE))?;
    Ok(())
  }

  /// Write one line through a non-blocking open. Fails fast with
  /// `NoReader` when the player is not listening.
  pub async fn write_direct(&self, line: &str) -> Result<(), FifoError> {
    let mut sender = match tokio::net::unix::pipe::OpenOptions::new().open_sender(&self.path) {
      Ok(sender) => sender,
      Err(e) if e.raw_os_error() == Some(libc::ENXIO) => return Err(FifoError::NoReader),
      Err(e) => return Err(e.into()),
    };

    let payload = format!("{}\n", line);
    match tokio::time::timeout(self.timeout, sender.write_all(payload.as_bytes())).await {
      Ok(Ok(())) => {
        log::debug!("Wrote {:?} to {:?}", line, self.path);
        Ok(())
      }
      Ok(Err(e)) => Err(e.into()),
      Err(_) => Err(FifoError::Timeout),
    }
  }

  /// Write one line through a helper shell process. The helper blocks until
  /// a reader appears; it is killed when the timeout expires.
  pub async fn write_via_helper(&self, line: &str) -> Result<(), FifoError> {
    let mut cmd = Command::new("sh");
    cmd
      .arg("-c")
      .arg(r#"printf '%s\n' "$1" > "$2""#)
      .arg("sh")
      .arg(line)
      .arg(&self.path)
      .stdin(std::process::Stdio::null())
      .stdout(std::process::Stdio::null())
      .stderr(std::process::Stdio::piped())
      .kill_on_drop(true);

    let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
      Ok(output) => output?,
      Err(_) => return Err(FifoError::Timeout),
    };
    if output.status.success() {
      log::debug!("Helper wrote {:?} to {:?}", line, self.path);
      Ok(())
    } else {
      Err(FifoError::Helper(
        String::from_utf8_lossy(&output.stderr).trim().to_string(),
      ))
    }
  }
}
