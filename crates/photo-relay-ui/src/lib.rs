#![warn(missing_docs)]
//! # photo-relay-ui
//!
//! ## Purpose
//! Defines the UI-facing state model and the command queue that carries
//! updates from worker threads to the UI thread.
//!
//! ## Responsibilities
//! - Represent the trigger control, status label, and modal popup.
//! - Expose [`UiNotifier`] for workers to post [`UiCommand`]s.
//! - Expose [`UiQueue`] for the UI thread to apply them to [`UiState`].
//!
//! ## Data flow
//! Coordinators post commands through a cloned [`UiNotifier`] -> the UI thread
//! drains [`UiQueue`] -> [`UiState::apply`] mutates the owned state -> the shell
//! renders it.
//!
//! ## Ownership and lifetimes
//! `UiState` lives on the UI thread only. Workers never hold a reference to
//! it; they own a sender half of the queue.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Posting to a
//! closed queue is logged and ignored, since a closed queue means the UI has
//! already shut down.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::debug;

/// Status label color category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    /// Idle/instructional text.
    Neutral,
    /// Work in progress.
    Busy,
    /// Last operation succeeded.
    Success,
    /// Last operation failed.
    Error,
}

impl StatusTone {
    /// RGB color used by graphical shells.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Neutral => (255, 255, 255),
            Self::Busy => (255, 200, 0),
            Self::Success => (0, 200, 0),
            Self::Error => (220, 0, 0),
        }
    }
}

/// Modal popup content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    /// Popup title.
    pub title: String,
    /// Popup body text.
    pub message: String,
}

/// One UI mutation posted by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Replaces the status label.
    SetStatus {
        /// Label text.
        text: String,
        /// Label color category.
        tone: StatusTone,
    },
    /// Enables or disables the trigger control.
    SetTriggerEnabled(bool),
    /// Shows a modal popup, replacing any open one.
    ShowPopup(Popup),
}

/// Idle label shown at startup and after dismissing results.
pub const IDLE_STATUS: &str = "Ready";

/// Aggregate UI runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Whether the trigger control accepts presses.
    pub trigger_enabled: bool,
    /// Status label text.
    pub status_text: String,
    /// Status label color category.
    pub status_tone: StatusTone,
    /// Currently open popup.
    pub popup: Option<Popup>,
}

impl UiState {
    /// Creates default UI state with the trigger enabled.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            trigger_enabled: true,
            status_text: IDLE_STATUS.to_string(),
            status_tone: StatusTone::Neutral,
            popup: None,
        }
    }

    /// Applies one command.
    pub fn apply(&mut self, command: UiCommand) {
        match command {
            UiCommand::SetStatus { text, tone } => {
                self.status_text = text;
                self.status_tone = tone;
            }
            UiCommand::SetTriggerEnabled(enabled) => self.trigger_enabled = enabled,
            UiCommand::ShowPopup(popup) => self.popup = Some(popup),
        }
    }

    /// Closes the popup, returning it.
    pub fn dismiss_popup(&mut self) -> Option<Popup> {
        self.popup.take()
    }
}

/// Creates a linked notifier/queue pair.
pub fn ui_channel() -> (UiNotifier, UiQueue) {
    let (sender, receiver) = mpsc::channel();
    (UiNotifier { sender }, UiQueue { receiver })
}

/// Sending half held by coordinators and workers.
#[derive(Debug, Clone)]
pub struct UiNotifier {
    sender: Sender<UiCommand>,
}

impl UiNotifier {
    /// Posts a raw command.
    pub fn post(&self, command: UiCommand) {
        if let Err(error) = self.sender.send(command) {
            debug!(stage = "ui", action = "post_dropped", command = ?error.0);
        }
    }

    /// Posts a status label update.
    pub fn status(&self, text: impl Into<String>, tone: StatusTone) {
        self.post(UiCommand::SetStatus {
            text: text.into(),
            tone,
        });
    }

    /// Posts a trigger enable/disable.
    pub fn trigger_enabled(&self, enabled: bool) {
        self.post(UiCommand::SetTriggerEnabled(enabled));
    }

    /// Posts a popup.
    pub fn popup(&self, title: impl Into<String>, message: impl Into<String>) {
        self.post(UiCommand::ShowPopup(Popup {
            title: title.into(),
            message: message.into(),
        }));
    }

    /// Posts an upload progress label.
    pub fn progress(&self, percent: u8) {
        self.status(progress_status(percent), StatusTone::Busy);
    }
}

/// Label text for an upload progress percentage.
pub fn progress_status(percent: u8) -> String {
    format!("Uploading... {}%", percent.min(100))
}

/// Receiving half owned by the UI thread.
#[derive(Debug)]
pub struct UiQueue {
    receiver: Receiver<UiCommand>,
}

impl UiQueue {
    /// Applies every queued command without blocking; returns how many.
    pub fn drain_into(&self, state: &mut UiState) -> usize {
        let mut applied = 0;
        for command in self.receiver.try_iter() {
            state.apply(command);
            applied += 1;
        }
        applied
    }

    /// Returns every queued command without applying it.
    pub fn pending(&self) -> Vec<UiCommand> {
        self.receiver.try_iter().collect()
    }
}
