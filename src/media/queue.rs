//! Two-slot play queue: `on_deck` plays next, `in_the_hole` after that.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::track::Track;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Queue is full")]
pub struct QueueFull;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueSlot {
  OnDeck,
  InTheHole,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
  on_deck: Option<Track>,
  in_the_hole: Option<Track>,
}

impl Queue {
  pub fn on_deck(&self) -> Option<&Track> {
    self.on_deck.as_ref()
  }

  pub fn in_the_hole(&self) -> Option<&Track> {
    self.in_the_hole.as_ref()
  }

  pub fn len(&self) -> usize {
    usize::from(self.on_deck.is_some()) + usize::from(self.in_the_hole.is_some())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Put `track` in the first empty slot.
  pub fn enqueue(&mut self, track: Track) -> Result<QueueSlot, QueueFull> {
    if self.on_deck.is_none() {
      self.on_deck = Some(track);
      Ok(QueueSlot::OnDeck)
    } else if self.in_the_hole.is_none() {
      self.in_the_hole = Some(track);
      Ok(QueueSlot::InTheHole)
    } else {
      Err(QueueFull)
    }
  }

  /// Remove the track in `slot`. Removing `on_deck` promotes `in_the_hole`.
  pub fn dequeue(&mut self, slot: QueueSlot) -> Option<Track> {
    match slot {
      QueueSlot::OnDeck => {
        let removed = self.on_deck.take();
        self.promote();
        removed
      }
      QueueSlot::InTheHole => self.in_the_hole.take(),
    }
  }

  /// Move `in_the_hole` to `on_deck`, replacing whatever was there.
  pub fn promote(&mut self) {
    self.on_deck = self.in_the_hole.take();
  }

  /// Take the next track to play and shift the queue up.
  pub fn advance(&mut self) -> Option<Track> {
    let next = self.on_deck.take();
    self.promote();
    next
  }

  /// Drop every queued entry for `path`. Returns whether anything was removed.
  pub fn remove_path(&mut self, path: &Path) -> bool {
    let mut removed = false;
    if self.in_the_hole.as_ref().and_then(Track::local_path) == Some(path) {
      self.in_the_hole = None;
      removed = true;
    }
    if self.on_deck.as_ref().and_then(Track::local_path) == Some(path) {
      self.on_deck = None;
      removed = true;
    }
    if self.on_deck.is_none() {
      self.promote();
    }
    removed
  }
}
