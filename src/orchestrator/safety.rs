//! Safety-tracking collaborator boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::warn;

use crate::error::Result;
use crate::orchestrator::types::GenerationMode;

/// A moderation rejection reported by the remote capability
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationEvent {
    pub owner: String,
    pub mode: GenerationMode,
    pub reason: String,
    pub variation_index: u32,
    pub occurred_at: DateTime<Utc>,
}

/// What the orchestrator must do after a reported violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyDirective {
    /// Keep going; carries the owner's warning count so far
    Continue { warnings: u32 },
    /// Terminal ban
    Suspend { reason: String },
}

/// Owns warning escalation and account suspension
#[async_trait]
pub trait SafetyTracker: Send + Sync {
    async fn report_violation(&self, event: ViolationEvent) -> Result<SafetyDirective>;

    async fn is_suspended(&self, owner: &str) -> Result<bool>;
}

/// Warning counter kept in process memory
pub struct InMemorySafetyTracker {
    warnings: DashMap<String, u32>,
    max_warnings: u32,
}

impl InMemorySafetyTracker {
    pub fn new(max_warnings: u32) -> Self {
        Self {
            warnings: DashMap::new(),
            max_warnings: max_warnings.max(1),
        }
    }

    pub fn warnings_for(&self, owner: &str) -> u32 {
        self.warnings.get(owner).map(|w| *w.value()).unwrap_or(0)
    }
}

#[async_trait]
impl SafetyTracker for InMemorySafetyTracker {
    async fn report_violation(&self, event: ViolationEvent) -> Result<SafetyDirective> {
        let count = {
            let mut entry = self.warnings.entry(event.owner.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        warn!(
            owner = %event.owner,
            mode = %event.mode,
            reason = %event.reason,
            warnings = count,
            "Moderation violation recorded"
        );

        if count >= self.max_warnings {
            Ok(SafetyDirective::Suspend {
                reason: format!(
                    "{} content policy violations (last: {})",
                    count, event.reason
                ),
            })
        } else {
            Ok(SafetyDirective::Continue { warnings: count })
        }
    }

    async fn is_suspended(&self, owner: &str) -> Result<bool> {
        Ok(self.warnings_for(owner) >= self.max_warnings)
    }
}
