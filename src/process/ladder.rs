//! Kill ladder: graceful → terminate → force-kill → verify.

use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use super::scan::{ProcessScanner, ProcessSignature};
use super::signal::{send_signal, Signal};
use super::ProcessError;
use crate::config::LadderConfig;

/// Outcome of a ladder run.
#[derive(Debug, Clone, Default)]
pub struct LadderReport {
  /// Pids found when the ladder started.
  pub found: Vec<u32>,
  /// Pids still present after the final verification.
  pub stragglers: Vec<u32>,
  /// Last stage reached.
  pub stage: &'static str,
  /// The global deadline expired before the ladder finished.
  pub timed_out: bool,
}

impl LadderReport {
  /// Nothing matching the signature survived.
  pub fn is_clean(&self) -> bool {
    self.stragglers.is_empty() && !self.timed_out
  }
}

/// Multi-stage escalation used to remove unresponsive processes.
#[derive(Debug, Clone)]
pub struct KillLadder {
  scanner: ProcessScanner,
  grace: Duration,
  term_wait: Duration,
  kill_wait: Duration,
  deadline: Duration,
}

impl KillLadder {
  pub fn new(scanner: ProcessScanner, config: &LadderConfig) -> Self {
    Self {
      scanner,
      grace: Duration::from_millis(config.grace_ms),
      term_wait: Duration::from_millis(config.term_wait_ms),
      kill_wait: Duration::from_millis(config.kill_wait_ms),
      deadline: Duration::from_millis(config.deadline_ms),
    }
  }

  /// Remove every process matching `signature`, except `exclude`.
  ///
  /// `graceful` is awaited first when at least one process exists (e.g. a
  /// quit command over the control channel). Never fails: when the global
  /// deadline expires the report is returned with `timed_out` set.
  pub async fn run(
    &self,
    signature: &ProcessSignature,
    exclude: &[u32],
    graceful: Option<BoxFuture<'_, ()>>,
  ) -> LadderReport {
    let progress = Mutex::new(LadderReport {
      stage: "enumerate",
      ..LadderReport::default()
    });

    let climb = self.climb(signature, exclude, graceful, &progress);
    let timed_out = tokio::time::timeout(self.deadline, climb).await.is_err();

    let mut report = progress.into_inner();
    if timed_out {
      report.timed_out = true;
      log::error!(
        "Kill ladder for {} exceeded {:?} at stage '{}', reporting completion anyway",
        signature.name,
        self.deadline,
        report.stage
      );
    }
    report
  }

  async fn climb(
    &self,
    signature: &ProcessSignature,
    exclude: &[u32],
    graceful: Option<BoxFuture<'_, ()>>,
    progress: &Mutex<LadderReport>,
  ) {
    // (a) enumerate with full command lines
    match self.scanner.scan_table(signature).await {
      Ok(matches) => {
        for m in matches.iter().filter(|m| !exclude.contains(&m.pid)) {
          log::info!("Found {} process {}: {}", signature.name, m.pid, m.cmdline);
        }
      }
      Err(e) => log::warn!("Could not list {} processes: {}", signature.name, e),
    }
    let mut survivors = self.scanner.probe_excluding(signature, exclude).await.pids();
    progress.lock().found = survivors.clone();
    if survivors.is_empty() {
      log::debug!("No {} processes to clean up", signature.name);
      progress.lock().stage = "done";
      return;
    }

    // (b) graceful request
    if let Some(graceful) = graceful {
      progress.lock().stage = "graceful";
      log::info!("Asking {} to quit gracefully", signature.name);
      graceful.await;
      tokio::time::sleep(self.grace).await;
      survivors = self.scanner.probe_excluding(signature, exclude).await.pids();
      if survivors.is_empty() {
        log::info!("{} exited after graceful quit", signature.name);
        progress.lock().stage = "done";
        return;
      }
    }

    // (c) SIGTERM each survivor individually
    progress.lock().stage = "terminate";
    Self::signal_each(&survivors, Signal::Term);
    tokio::time::sleep(self.term_wait).await;
    survivors = self.scanner.probe_excluding(signature, exclude).await.pids();

    // (d) SIGKILL whatever is left
    if !survivors.is_empty() {
      progress.lock().stage = "kill";
      log::warn!("{} survived SIGTERM: {:?}, sending SIGKILL", signature.name, survivors);
      Self::signal_each(&survivors, Signal::Kill);
      tokio::time::sleep(self.kill_wait).await;
    }

    // (e) final verification through both methods
    progress.lock().stage = "verify";
    let probe = self.scanner.probe_excluding(signature, exclude).await;
    let stragglers = probe.pids();
    if stragglers.is_empty() {
      log::info!("All {} processes removed", signature.name);
    } else {
      log::error!(
        "{} processes survived the full kill ladder: {:?}",
        signature.name,
        stragglers
      );
    }
    let mut report = progress.lock();
    report.stragglers = stragglers;
    report.stage = "done";
  }

  fn signal_each(pids: &[u32], signal: Signal) {
    for pid in pids {
      match send_signal(*pid, signal) {
        Ok(()) => log::info!("Sent {:?} to {}", signal, pid),
        Err(ProcessError::NotFound(_)) => log::debug!("Process {} already gone", pid),
        Err(e) => log::error!("{}", e),
      }
    }
  }
}
