//! Button input: edge events, the edge channel, and gesture classification
//!
//! Edge sources (the GPIO poller, the remote API) push [`EdgeEvent`]s into a
//! bounded channel. A single consumer thread drains it into the
//! [`GestureClassifier`], so edge producers never run application logic.

pub mod gesture;
pub mod keyboard;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Instant;

use serde::{Deserialize, Serialize};

pub use gesture::{GestureClassifier, GestureSink};

use crate::task;
use crate::{Error, Result};

/// One physical button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonId {
    #[serde(rename = "BUTTON_1")]
    Button1,
    #[serde(rename = "BUTTON_2")]
    Button2,
    #[serde(rename = "BUTTON_3")]
    Button3,
    #[serde(rename = "BUTTON_4")]
    Button4,
}

impl ButtonId {
    pub const ALL: [Self; 4] = [Self::Button1, Self::Button2, Self::Button3, Self::Button4];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Button1 => "BUTTON_1",
            Self::Button2 => "BUTTON_2",
            Self::Button3 => "BUTTON_3",
            Self::Button4 => "BUTTON_4",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Button1 => 0,
            Self::Button2 => 1,
            Self::Button3 => 2,
            Self::Button4 => 3,
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ButtonId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUTTON_1" | "1" => Ok(Self::Button1),
            "BUTTON_2" | "2" => Ok(Self::Button2),
            "BUTTON_3" | "3" => Ok(Self::Button3),
            "BUTTON_4" | "4" => Ok(Self::Button4),
            _ => Err(Error::Command(format!("unknown button: {s}"))),
        }
    }
}

/// Logical line level; buttons are wired active-low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Pressed
    Low,
    /// Released
    High,
}

impl Level {
    #[must_use]
    pub const fn is_pressed(self) -> bool {
        matches!(self, Self::Low)
    }
}

/// A debounced transition on one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub button: ButtonId,
    pub level: Level,
    pub at: Instant,
}

impl EdgeEvent {
    #[must_use]
    pub fn now(button: ButtonId, level: Level) -> Self {
        Self {
            button,
            level,
            at: Instant::now(),
        }
    }
}

/// Classified gesture kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    SinglePress,
    DoubleTap,
    LongPress,
}

impl GestureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SinglePress => "single_press",
            Self::DoubleTap => "double_tap",
            Self::LongPress => "long_press",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified gesture, consumed exactly once by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    pub button: ButtonId,
    pub kind: GestureKind,
    pub at: Instant,
}

/// Producer side of the bounded edge channel
#[derive(Debug, Clone)]
pub struct EdgeSender {
    tx: SyncSender<EdgeEvent>,
}

impl EdgeSender {
    /// Queue an edge without blocking
    ///
    /// Returns `false` if the edge was dropped because the queue is full or
    /// the consumer has gone away.
    pub fn send(&self, edge: EdgeEvent) -> bool {
        match self.tx.try_send(edge) {
            Ok(()) => true,
            Err(TrySendError::Full(edge)) => {
                tracing::warn!(button = %edge.button, level = ?edge.level, "edge queue full, dropping edge");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("edge consumer stopped, dropping edge");
                false
            }
        }
    }
}

/// Create the bounded edge channel
#[must_use]
pub fn edge_channel(capacity: usize) -> (EdgeSender, Receiver<EdgeEvent>) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (EdgeSender { tx }, rx)
}

/// Drain the edge channel into the classifier until every sender is dropped
///
/// # Errors
///
/// Returns error if the consumer thread cannot be spawned
pub fn spawn_edge_consumer(
    rx: Receiver<EdgeEvent>,
    classifier: Arc<GestureClassifier>,
) -> Result<JoinHandle<()>> {
    task::spawn_loop("edge-consumer", move || {
        for edge in rx {
            classifier.on_edge(edge);
        }
        tracing::debug!("edge consumer stopped");
    })
}
