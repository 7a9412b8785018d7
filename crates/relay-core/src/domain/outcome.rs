//! Outcome model: per-invocation results and the per-publish report.
//!
//! A report is diagnostics only. Publishing never fails because a subscriber
//! failed; the producer's business operation stays independent of downstream
//! handler health.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::HandlerError;
use super::ids::{PublishId, SubscriptionId};

/// Result of one handler invocation within a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationOutcome {
    Completed,
    Failed(HandlerError),
    /// Cancellation fired before the invocation started.
    Skipped,
}

/// One isolated handler failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFailure {
    pub subscription_id: SubscriptionId,
    pub handler: String,
    pub error: HandlerError,
}

/// Aggregate result of one publish call.
///
/// `handlers == completed + failures.len() + skipped + pending` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub publish_id: PublishId,
    pub message_type: String,
    pub published_at: DateTime<Utc>,

    /// Size of the handler snapshot taken for this publish.
    pub handlers: usize,
    pub completed: usize,
    pub skipped: usize,

    /// Invocations still running when the caller returned early on cancellation.
    pub pending: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    pub fn new(publish_id: PublishId, message_type: impl Into<String>, handlers: usize) -> Self {
        Self {
            publish_id,
            message_type: message_type.into(),
            published_at: Utc::now(),
            handlers,
            completed: 0,
            skipped: 0,
            pending: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(
        &mut self,
        subscription_id: SubscriptionId,
        handler: &str,
        outcome: InvocationOutcome,
    ) {
        match outcome {
            InvocationOutcome::Completed => self.completed += 1,
            InvocationOutcome::Skipped => self.skipped += 1,
            InvocationOutcome::Failed(error) => self.failures.push(HandlerFailure {
                subscription_id,
                handler: handler.to_string(),
                error,
            }),
        }
    }

    /// Nobody was subscribed; the publish was a no-op.
    pub fn is_noop(&self) -> bool {
        self.handlers == 0
    }

    /// Every handler in the snapshot ran to completion without error.
    pub fn all_completed(&self) -> bool {
        self.completed == self.handlers
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Invocations that actually started (finished or still running).
    pub fn attempted(&self) -> usize {
        self.handlers - self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_counts_consistent() {
        let mut report = PublishReport::new(PublishId::generate(), "t", 3);
        report.record(SubscriptionId::generate(), "a", InvocationOutcome::Completed);
        report.record(
            SubscriptionId::generate(),
            "b",
            InvocationOutcome::Failed(HandlerError::failed("nope")),
        );
        report.record(SubscriptionId::generate(), "c", InvocationOutcome::Skipped);

        assert_eq!(report.completed, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.attempted(), 2);
        assert!(!report.all_completed());
        assert_eq!(report.failures[0].handler, "b");
    }

    #[test]
    fn empty_report_is_noop_and_complete() {
        let report = PublishReport::new(PublishId::generate(), "t", 0);
        assert!(report.is_noop());
        assert!(report.all_completed());
    }

    #[test]
    fn report_omits_empty_failures_in_json() {
        let report = PublishReport::new(PublishId::generate(), "t", 0);
        let v = serde_json::to_value(&report).unwrap();
        assert!(v.get("failures").is_none());
        assert_eq!(v["handlers"], 0);
    }

    #[test]
    fn invocation_outcome_serializes_as_screaming_snake() {
        let s = serde_json::to_string(&InvocationOutcome::Completed).unwrap();
        assert_eq!(s, r#"{"kind":"COMPLETED"}"#);
    }
}
