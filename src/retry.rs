//! Typed retry policy shared by every component.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

/// Bounded retry with exponential backoff.
///
/// `is_retryable` decides per error whether another attempt is worth it;
/// non-retryable errors are returned immediately.
pub struct RetryPolicy<E> {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub backoff_factor: f64,
  pub is_retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
  fn clone(&self) -> Self {
    Self {
      max_attempts: self.max_attempts,
      base_delay: self.base_delay,
      backoff_factor: self.backoff_factor,
      is_retryable: self.is_retryable,
    }
  }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RetryPolicy")
      .field("max_attempts", &self.max_attempts)
      .field("base_delay", &self.base_delay)
      .field("backoff_factor", &self.backoff_factor)
      .finish()
  }
}

fn always<E>(_: &E) -> bool {
  true
}

impl<E: Display> RetryPolicy<E> {
  /// Policy that retries every error.
  pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      base_delay,
      backoff_factor,
      is_retryable: always::<E>,
    }
  }

  /// Build a policy from configuration.
  pub fn from_config(config: &RetryConfig) -> Self {
    Self::new(
      config.max_attempts,
      Duration::from_millis(config.base_delay_ms),
      config.backoff_factor,
    )
  }

  /// Replace the retry predicate.
  pub fn retry_if(mut self, predicate: fn(&E) -> bool) -> Self {
    self.is_retryable = predicate;
    self
  }

  /// Delay to wait after the given (1-based) failed attempt.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let factor = self.backoff_factor.max(1.0).powi(exponent);
    self.base_delay.mul_f64(factor)
  }

  /// Run `op` until it succeeds, returns a non-retryable error, or the
  /// attempts are used up. `op` receives the 1-based attempt number.
  pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let mut attempt = 1;
    loop {
      match op(attempt).await {
        Ok(value) => return Ok(value),
        Err(e) => {
          if attempt >= self.max_attempts || !(self.is_retryable)(&e) {
            log::debug!("{}: giving up after attempt {}: {}", label, attempt, e);
            return Err(e);
          }
          let delay = self.delay_after(attempt);
          log::warn!(
            "{}: attempt {}/{} failed: {}, retrying in {:?}",
            label,
            attempt,
            self.max_attempts,
            e,
            delay
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}
