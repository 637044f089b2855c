//! Playback state machine driven by player events.
//!
//! The player reports "file ended" the same way whether the track ran out or
//! we stopped it to load something else. `skip_auto_advance` marks stops we
//! caused so they do not pull the next queued track.

use serde::Serialize;

use crate::mpv::MpvEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
  #[default]
  Idle,
  Loading,
  Playing,
  Paused,
}

impl Phase {
  /// Something is loaded or loading.
  pub fn is_active(self) -> bool {
    !matches!(self, Phase::Idle)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
  Started,
  Stopped,
  Error(String),
  Paused,
  Resumed,
  TimePosition(f64),
  DurationKnown(f64),
}

impl PlayerEvent {
  /// Map a raw MPV event. Events the controller does not care about give `None`.
  pub fn from_mpv(event: &MpvEvent) -> Option<Self> {
    match event.event.as_str() {
      "file-loaded" => Some(PlayerEvent::Started),
      "end-file" => match event.reason.as_deref() {
        Some("error") => Some(PlayerEvent::Error(
          event
            .file_error
            .clone()
            .unwrap_or_else(|| "playback error".to_string()),
        )),
        _ => Some(PlayerEvent::Stopped),
      },
      "property-change" => {
        let data = event.data.as_ref()?;
        match event.name.as_deref()? {
          "pause" => data
            .as_bool()
            .map(|paused| if paused { PlayerEvent::Paused } else { PlayerEvent::Resumed }),
          "time-pos" => data.as_f64().map(PlayerEvent::TimePosition),
          "duration" => data.as_f64().map(PlayerEvent::DurationKnown),
          _ => None,
        }
      }
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
  AutoAdvance,
  PublishProgress,
  PublishError(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Machine {
  pub phase: Phase,
  pub skip_auto_advance: bool,
  /// A load was sent and its `Started` has not arrived yet.
  pub load_pending: bool,
  pub position: f64,
  pub duration: Option<f64>,
}

impl Machine {
  /// About to load a new track. Returns whether the stop of the current one
  /// must be ignored.
  pub fn begin_load(&mut self, duration: Option<f64>) -> bool {
    let replacing = self.phase.is_active();
    if replacing {
      self.skip_auto_advance = true;
    }
    self.phase = Phase::Loading;
    self.load_pending = true;
    self.position = 0.0;
    self.duration = duration;
    replacing
  }

  /// Stopping on purpose: the resulting `Stopped` must not advance.
  pub fn begin_stop(&mut self) {
    if self.phase.is_active() {
      self.skip_auto_advance = true;
    }
    self.phase = Phase::Idle;
    self.load_pending = false;
  }

  /// A load that was sent but lost the output: its start and the stop that
  /// follows must not advance.
  pub fn abandon_load(&mut self) {
    self.skip_auto_advance = true;
    self.phase = Phase::Idle;
    self.load_pending = false;
  }
}

pub fn transition(machine: &Machine, event: PlayerEvent) -> (Machine, Vec<Effect>) {
  let mut next = machine.clone();
  let mut effects = Vec::new();

  match event {
    PlayerEvent::Started => {
      next.phase = Phase::Playing;
      next.load_pending = false;
    }
    PlayerEvent::Stopped if machine.skip_auto_advance => {
      next.skip_auto_advance = false;
      next.phase = if machine.load_pending {
        Phase::Loading
      } else {
        Phase::Idle
      };
    }
    // Nothing was playing; a second end-file for the same track lands here too.
    PlayerEvent::Stopped if !machine.phase.is_active() => {}
    PlayerEvent::Stopped => {
      next.phase = Phase::Idle;
      next.load_pending = false;
      effects.push(Effect::AutoAdvance);
    }
    PlayerEvent::Error(message) => {
      next.phase = Phase::Idle;
      next.load_pending = false;
      next.skip_auto_advance = false;
      effects.push(Effect::PublishError(message));
    }
    PlayerEvent::Paused if matches!(machine.phase, Phase::Playing | Phase::Paused) => {
      next.phase = Phase::Paused;
    }
    PlayerEvent::Resumed if matches!(machine.phase, Phase::Playing | Phase::Paused) => {
      next.phase = Phase::Playing;
    }
    PlayerEvent::Paused | PlayerEvent::Resumed => {}
    PlayerEvent::TimePosition(position) => {
      next.position = position;
      effects.push(Effect::PublishProgress);
    }
    PlayerEvent::DurationKnown(duration) => {
      next.duration = Some(duration);
      effects.push(Effect::PublishProgress);
    }
  }

  (next, effects)
}
