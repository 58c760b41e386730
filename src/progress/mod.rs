//! Progress tracking for image pull and push
//!
//! The daemon reports a pull or push as a stream of per-layer status messages. The
//! [`TransferProgress`] aggregator folds those messages into a percentage-complete
//! estimate, and [`ProgressBar`] renders it on a single terminal line.

use crate::error::{FleetError, Result};
use crate::logging::Logger;
use serde::Deserialize;
use std::collections::HashSet;

/// Direction of an image transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Pull,
    Push,
}

impl TransferKind {
    /// Statuses meaning a layer needs no further transfer
    pub fn terminal_statuses(&self) -> &'static [&'static str] {
        match self {
            TransferKind::Pull => &["Already exists", "Pull complete"],
            TransferKind::Push => &["Layer already exists", "Pushed"],
        }
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal_statuses().contains(&status)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransferKind::Pull => "Pulling",
            TransferKind::Push => "Pushing",
        }
    }
}

/// One decoded status message from a pull or push stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LayerEvent {
    #[serde(rename = "id", default)]
    pub layer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl LayerEvent {
    pub fn new(layer_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            layer_id: Some(layer_id.into()),
            status: Some(status.into()),
        }
    }

    /// Decode one JSON status line as emitted by the daemon.
    ///
    /// A line carrying an `error` field ends the transfer and becomes
    /// [`FleetError::Stream`].
    pub fn from_json_line(line: &str) -> Result<Self> {
        let line: StatusLine = serde_json::from_str(line)?;
        match line.error {
            Some(message) => Err(FleetError::Stream(message)),
            None => Ok(line.event),
        }
    }
}

#[derive(Deserialize)]
struct StatusLine {
    #[serde(flatten)]
    event: LayerEvent,
    #[serde(default)]
    error: Option<String>,
}

/// Layers seen and completed during one transfer
#[derive(Debug, Clone)]
pub struct TransferProgress {
    kind: TransferKind,
    seen: HashSet<String>,
    completed: HashSet<String>,
}

impl TransferProgress {
    pub fn new(kind: TransferKind) -> Self {
        Self {
            kind,
            seen: HashSet::new(),
            completed: HashSet::new(),
        }
    }

    /// Fold one event into the state.
    ///
    /// Returns `None` for events that lack a layer id or a status; those leave the
    /// state untouched. The percentage is a snapshot and may drop when new layers
    /// show up after others have completed.
    pub fn process(&mut self, event: &LayerEvent) -> Option<f64> {
        let (Some(layer_id), Some(status)) = (&event.layer_id, &event.status) else {
            return None;
        };

        self.seen.insert(layer_id.clone());
        if self.kind.is_terminal(status) {
            self.completed.insert(layer_id.clone());
        }

        Some(self.percentage())
    }

    pub fn percentage(&self) -> f64 {
        let ratio = self.completed.len() as f64 / (self.seen.len().max(1)) as f64;
        ratio.clamp(0.0, 1.0) * 100.0
    }

    pub fn seen(&self) -> &HashSet<String> {
        &self.seen
    }

    pub fn completed(&self) -> &HashSet<String> {
        &self.completed
    }
}

/// Single-line textual progress indicator
pub struct ProgressBar {
    label: String,
    logger: Logger,
    last: Option<f64>,
}

impl ProgressBar {
    pub fn new(label: impl Into<String>, logger: Logger) -> Self {
        Self {
            label: label.into(),
            logger,
            last: None,
        }
    }

    pub fn update(&mut self, percentage: f64) {
        // Redraw only when the shown value changes
        let rounded = (percentage * 10.0).round() / 10.0;
        if self.last != Some(rounded) {
            self.logger.progress_bar(&self.label, rounded);
            self.last = Some(rounded);
        }
    }

    /// Always shows 100%, whatever the last computed value was
    pub fn done(self) {
        self.logger.progress_done(&self.label);
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }
}
