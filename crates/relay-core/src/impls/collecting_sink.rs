//! CollectingFailureSink - handler 失敗をメモリに貯める実装
//!
//! # 用途
//! - テストでの assert
//! - 診断エンドポイントなどで直近の失敗を見せる

use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::{HandlerFailure, MessageType, PublishId};
use crate::ports::FailureSink;

/// 記録された失敗 1 件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedFailure {
    pub publish_id: PublishId,
    pub message_type: String,
    pub failure: HandlerFailure,
}

#[derive(Debug, Default)]
pub struct CollectingFailureSink {
    failures: Mutex<Vec<RecordedFailure>>,
}

impl CollectingFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }

    /// 貯まった失敗を取り出して空にする
    pub fn drain(&self) -> Vec<RecordedFailure> {
        std::mem::take(&mut *self.failures.lock())
    }
}

impl FailureSink for CollectingFailureSink {
    fn record(&self, publish_id: PublishId, message_type: &MessageType, failure: &HandlerFailure) {
        self.failures.lock().push(RecordedFailure {
            publish_id,
            message_type: message_type.name().to_string(),
            failure: failure.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HandlerError, SubscriptionId};

    #[test]
    fn records_and_drains() {
        let sink = CollectingFailureSink::new();
        let failure = HandlerFailure {
            subscription_id: SubscriptionId::generate(),
            handler: "reprice".to_string(),
            error: HandlerError::failed("db down"),
        };

        sink.record(PublishId::generate(), &MessageType::of::<u8>(), &failure);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.failures()[0].message_type, "u8");

        let drained = sink.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].failure, failure);
        assert!(sink.is_empty());
    }
}
