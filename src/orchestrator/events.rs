//! Progress events streamed to the caller while a request runs

use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use crate::orchestrator::types::GeneratedImage;

/// User-facing retry status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStatus {
    Generating,
    /// Countdown before the first retry
    RetryingIn(u32),
    Reconnecting,
    FinalAttempt,
}

impl fmt::Display for RetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStatus::Generating => write!(f, "Generating…"),
            RetryStatus::RetryingIn(seconds) => write!(f, "Retrying in {}…", seconds),
            RetryStatus::Reconnecting => write!(f, "Re-establishing connection…"),
            RetryStatus::FinalAttempt => write!(f, "Final attempt…"),
        }
    }
}

/// Receives progress while a request runs.
///
/// Items arrive in generation order within an attempt. Items of an attempt
/// that later fails are followed by `on_cleared` for that attempt.
pub trait GenerationObserver: Send {
    fn on_item(&mut self, _attempt: u32, _image: &GeneratedImage) {}

    fn on_status(&mut self, _status: &RetryStatus) {}

    fn on_cleared(&mut self, _attempt: u32) {}
}

/// Discards all progress
impl GenerationObserver for () {}

/// Progress event as sent over a channel
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Status(RetryStatus),
    Item { attempt: u32, image: GeneratedImage },
    Cleared { attempt: u32 },
}

/// Forwards progress into an unbounded channel; a closed receiver is ignored
pub struct ChannelObserver {
    tx: UnboundedSender<GenerationEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<GenerationEvent>) -> Self {
        Self { tx }
    }
}

impl GenerationObserver for ChannelObserver {
    fn on_item(&mut self, attempt: u32, image: &GeneratedImage) {
        let _ = self.tx.send(GenerationEvent::Item {
            attempt,
            image: image.clone(),
        });
    }

    fn on_status(&mut self, status: &RetryStatus) {
        let _ = self.tx.send(GenerationEvent::Status(status.clone()));
    }

    fn on_cleared(&mut self, attempt: u32) {
        let _ = self.tx.send(GenerationEvent::Cleared { attempt });
    }
}

/// Records every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<GenerationEvent>,
}

impl RecordingObserver {
    /// Item indices emitted during the given attempt
    pub fn items_for(&self, attempt: u32) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::Item { attempt: a, image } if *a == attempt => Some(image.index),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<RetryStatus> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::Status(status) => Some(status.clone()),
                _ => None,
            })
            .collect()
    }
}

impl GenerationObserver for RecordingObserver {
    fn on_item(&mut self, attempt: u32, image: &GeneratedImage) {
        self.events.push(GenerationEvent::Item {
            attempt,
            image: image.clone(),
        });
    }

    fn on_status(&mut self, status: &RetryStatus) {
        self.events.push(GenerationEvent::Status(status.clone()));
    }

    fn on_cleared(&mut self, attempt: u32) {
        self.events.push(GenerationEvent::Cleared { attempt });
    }
}
