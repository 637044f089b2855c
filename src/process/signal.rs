//! Per-pid signal delivery.

use super::ProcessError;

/// Signals the supervisors send to external processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
  Term,
  Kill,
  Stop,
  Cont,
}

impl Signal {
  fn raw(self) -> libc::c_int {
    match self {
      Signal::Term => libc::SIGTERM,
      Signal::Kill => libc::SIGKILL,
      Signal::Stop => libc::SIGSTOP,
      Signal::Cont => libc::SIGCONT,
    }
  }
}

/// Send `signal` to a single process.
pub fn send_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
  let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
    return Err(ProcessError::NotFound(pid));
  };
  if raw_pid <= 0 {
    // 0 and negative pids address process groups, never a single process.
    return Err(ProcessError::NotFound(pid));
  }

  // SAFETY: kill(2) has no memory-safety preconditions.
  let rc = unsafe { libc::kill(raw_pid, signal.raw()) };
  if rc == 0 {
    log::debug!("Sent {:?} to pid {}", signal, pid);
    return Ok(());
  }

  let err = std::io::Error::last_os_error();
  if err.raw_os_error() == Some(libc::ESRCH) {
    Err(ProcessError::NotFound(pid))
  } else {
    Err(ProcessError::Signal { pid, source: err })
  }
}

/// Check whether a process exists (signal 0).
pub fn is_alive(pid: u32) -> bool {
  let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
    return false;
  };
  if raw_pid <= 0 {
    return false;
  }
  // SAFETY: signal 0 performs only the existence and permission check.
  let rc = unsafe { libc::kill(raw_pid, 0) };
  rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_own_process_is_alive() {
    assert!(is_alive(std::process::id()));
  }

  #[test]
  fn test_rejects_group_pids() {
    assert!(matches!(send_signal(0, Signal::Term), Err(ProcessError::NotFound(0))));
    assert!(!is_alive(0));
  }

  #[test]
  fn test_signal_terminates_child() {
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id();
    send_signal(pid, Signal::Kill).unwrap();
    let status = child.wait().unwrap();
    assert!(!status.success());
    assert!(matches!(send_signal(pid, Signal::Term), Err(ProcessError::NotFound(_))));
  }
}
