//! MPV binary detection and process spawning.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::process::{ProcessError, ProcessSignature};

/// Find the MPV executable: on PATH first, then common install locations.
pub fn find_mpv() -> Option<PathBuf> {
  if let Ok(path) = which::which("mpv") {
    return Some(path);
  }

  #[cfg(target_os = "macos")]
  let common_paths = [
    "/usr/local/bin/mpv",
    "/opt/homebrew/bin/mpv",
    "/Applications/mpv.app/Contents/MacOS/mpv",
  ];
  #[cfg(not(target_os = "macos"))]
  let common_paths = ["/usr/bin/mpv", "/usr/local/bin/mpv"];

  common_paths.iter().map(PathBuf::from).find(|p| p.exists())
}

/// How MPV instances bound to `socket` are recognized in the process table.
///
/// Matching on the socket path leaves unrelated MPV instances alone.
pub fn socket_signature(socket: &Path) -> ProcessSignature {
  ProcessSignature::with_arg("mpv", format!("--input-ipc-server={}", socket.display()))
}

/// Spawn MPV in idle mode with the IPC server on `socket`.
pub fn spawn_mpv(mpv_exe: &Path, socket: &Path, extra_args: &[String]) -> Result<Child, ProcessError> {
  log::info!("Spawning MPV: {:?} with IPC: {:?}", mpv_exe, socket);
  if !extra_args.is_empty() {
    log::info!("Extra MPV args: {:?}", extra_args);
  }

  let mut cmd = Command::new(mpv_exe);
  cmd
    .arg(format!("--input-ipc-server={}", socket.display()))
    .arg("--idle")
    .arg("--no-video")
    .arg("--no-terminal")
    .args(extra_args)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .process_group(0);

  cmd.spawn().map_err(|source| ProcessError::Spawn {
    program: mpv_exe.display().to_string(),
    source,
  })
}

/// Remove a leftover socket file.
pub fn cleanup_ipc(socket: &Path) {
  match std::fs::remove_file(socket) {
    Ok(()) => log::debug!("Removed MPV socket {:?}", socket),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => log::warn!("Failed to remove MPV socket {:?}: {}", socket, e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_signature_matches_only_our_socket() {
    let signature = socket_signature(Path::new("/tmp/a.sock"));
    let ours = vec![
      "mpv".to_string(),
      "--input-ipc-server=/tmp/a.sock".to_string(),
      "--idle".to_string(),
    ];
    let other = vec!["mpv".to_string(), "--input-ipc-server=/tmp/b.sock".to_string()];
    assert!(signature.matches("mpv", &ours));
    assert!(!signature.matches("mpv", &other));
  }

  #[test]
  fn test_cleanup_missing_socket_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    cleanup_ipc(&dir.path().join("none.sock"));
  }
}
