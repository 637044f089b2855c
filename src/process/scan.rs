//! Process enumeration.
//!
//! A single enumeration method can miss or misreport processes (truncated
//! names, zombies, permission quirks), so every probe runs two independent
//! methods: the process table read through `sysinfo`, and `pgrep`.

use std::path::Path;
use std::time::Duration;

use sysinfo::{ProcessStatus, System};
use tokio::process::Command;

use super::ProcessError;

/// Kernel limit on the process name as reported by `comm`.
const COMM_LEN: usize = 15;

const INTERPRETERS: &[&str] = &["sh", "bash", "dash", "zsh", "python3", "python", "perl"];

/// How a family of external processes is recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSignature {
  /// Executable name (basename).
  pub name: String,
  /// Optional argument that must appear verbatim in the command line.
  pub arg: Option<String>,
}

impl ProcessSignature {
  /// Match by executable name. A path is reduced to its basename.
  pub fn named(program: &str) -> Self {
    let name = Path::new(program)
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| program.to_string());
    Self { name, arg: None }
  }

  /// Match by executable name and one whole command-line argument.
  pub fn with_arg(program: &str, arg: impl Into<String>) -> Self {
    let mut signature = Self::named(program);
    signature.arg = Some(arg.into());
    signature
  }

  fn name_matches(&self, process_name: &str, cmd: &[String]) -> bool {
    if process_name == self.name {
      return true;
    }
    if self.name.len() > COMM_LEN
      && process_name.len() == COMM_LEN
      && self.name.starts_with(process_name)
    {
      return true;
    }
    let base = |word: &String| {
      Path::new(word)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
    };
    match cmd {
      [argv0, ..] if base(argv0) == self.name => true,
      // Scripts show up as `<interpreter> <script>`.
      [argv0, script, ..] if INTERPRETERS.contains(&base(argv0).as_str()) => base(script) == self.name,
      _ => false,
    }
  }

  /// Check a process table entry against the signature.
  pub fn matches(&self, process_name: &str, cmd: &[String]) -> bool {
    if !self.name_matches(process_name, cmd) {
      return false;
    }
    match &self.arg {
      Some(arg) => cmd.iter().any(|c| c == arg),
      None => true,
    }
  }

  fn pgrep_args(&self) -> Vec<String> {
    match &self.arg {
      Some(arg) => vec![
        "-f".to_string(),
        "--".to_string(),
        format!("{}.* {}( |$)", escape_regex(&self.name), escape_regex(arg)),
      ],
      None if self.name.len() > COMM_LEN => vec![
        "-f".to_string(),
        "--".to_string(),
        format!("(^|/){}( |$)", escape_regex(&self.name)),
      ],
      None => vec!["-x".to_string(), "--".to_string(), self.name.clone()],
    }
  }
}

fn escape_regex(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    if "\\.^$|?*+()[]{}".contains(c) {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

/// A zombie has exited and only waits to be reaped.
fn is_zombie(pid: u32) -> bool {
  std::fs::read_to_string(format!("/proc/{}/stat", pid))
    .ok()
    .and_then(|stat| {
      stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next().map(|state| state == "Z"))
    })
    .unwrap_or(false)
}

/// A process found in the process table.
#[derive(Debug, Clone)]
pub struct ProcessMatch {
  pub pid: u32,
  pub name: String,
  pub cmdline: String,
}

/// Result of a dual-method probe.
#[derive(Debug, Clone, Default)]
pub struct Probe {
  /// Pids found in the process table.
  pub table: Vec<u32>,
  /// Pids reported by `pgrep`; `None` when `pgrep` could not run.
  pub pgrep: Option<Vec<u32>>,
}

impl Probe {
  /// Both methods agree that at least one process exists. When `pgrep` is
  /// unavailable the process table alone decides.
  pub fn confirmed(&self) -> bool {
    match &self.pgrep {
      Some(pgrep) => !self.table.is_empty() && !pgrep.is_empty(),
      None => !self.table.is_empty(),
    }
  }

  /// Either method saw a process.
  pub fn any(&self) -> bool {
    !self.table.is_empty() || self.pgrep.as_ref().is_some_and(|p| !p.is_empty())
  }

  /// Union of the pids seen by both methods.
  pub fn pids(&self) -> Vec<u32> {
    let mut pids = self.table.clone();
    if let Some(pgrep) = &self.pgrep {
      pids.extend(pgrep.iter().copied());
    }
    pids.sort_unstable();
    pids.dedup();
    pids
  }
}

/// Enumerates processes matching a signature.
#[derive(Debug, Clone)]
pub struct ProcessScanner {
  pgrep_timeout: Duration,
}

impl Default for ProcessScanner {
  fn default() -> Self {
    Self::new(Duration::from_secs(3))
  }
}

impl ProcessScanner {
  pub fn new(pgrep_timeout: Duration) -> Self {
    Self { pgrep_timeout }
  }

  /// Read the process table, returning full command lines.
  pub async fn scan_table(&self, signature: &ProcessSignature) -> Result<Vec<ProcessMatch>, ProcessError> {
    let signature = signature.clone();
    let own_pid = std::process::id();
    tokio::task::spawn_blocking(move || {
      let mut system = System::new();
      system.refresh_processes();
      let mut matches: Vec<ProcessMatch> = system
        .processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != own_pid)
        .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
        .filter(|(_, process)| signature.matches(process.name(), process.cmd()))
        .map(|(pid, process)| ProcessMatch {
          pid: pid.as_u32(),
          name: process.name().to_string(),
          cmdline: process.cmd().join(" "),
        })
        .collect();
      matches.sort_by_key(|m| m.pid);
      matches
    })
    .await
    .map_err(|e| ProcessError::Enumerate(format!("process table scan panicked: {}", e)))
  }

  /// Ask `pgrep` for matching pids.
  pub async fn scan_pgrep(&self, signature: &ProcessSignature) -> Result<Vec<u32>, ProcessError> {
    let mut cmd = Command::new("pgrep");
    cmd.args(signature.pgrep_args()).kill_on_drop(true);

    let output = tokio::time::timeout(self.pgrep_timeout, cmd.output())
      .await
      .map_err(|_| ProcessError::Timeout("pgrep"))?
      .map_err(|source| ProcessError::Spawn {
        program: "pgrep".to_string(),
        source,
      })?;

    // Exit code 1 means "no match"; anything above is a real failure.
    match output.status.code() {
      Some(0) | Some(1) => {}
      code => {
        return Err(ProcessError::Enumerate(format!(
          "pgrep exited with {:?}: {}",
          code,
          String::from_utf8_lossy(&output.stderr).trim()
        )))
      }
    }

    let own_pid = std::process::id();
    let mut pids: Vec<u32> = String::from_utf8_lossy(&output.stdout)
      .lines()
      .filter_map(|line| line.trim().parse::<u32>().ok())
      .filter(|pid| *pid != own_pid && !is_zombie(*pid))
      .collect();
    pids.sort_unstable();
    Ok(pids)
  }

  /// Run both methods.
  pub async fn probe(&self, signature: &ProcessSignature) -> Probe {
    let (table, pgrep) = tokio::join!(self.scan_table(signature), self.scan_pgrep(signature));

    let table = match table {
      Ok(matches) => matches.into_iter().map(|m| m.pid).collect(),
      Err(e) => {
        log::warn!("Process table scan for {} failed: {}", signature.name, e);
        Vec::new()
      }
    };
    let pgrep = match pgrep {
      Ok(pids) => Some(pids),
      Err(e) => {
        log::warn!("pgrep for {} failed: {}", signature.name, e);
        None
      }
    };

    Probe { table, pgrep }
  }

  /// Probe, excluding pids the caller owns.
  pub async fn probe_excluding(&self, signature: &ProcessSignature, exclude: &[u32]) -> Probe {
    let mut probe = self.probe(signature).await;
    probe.table.retain(|pid| !exclude.contains(pid));
    if let Some(pgrep) = probe.pgrep.as_mut() {
      pgrep.retain(|pid| !exclude.contains(pid));
    }
    probe
  }
}
