//! NoopFailureSink - 何も記録しないデフォルト実装
//!
//! 失敗のログ出力は dispatcher 自身が行うので、追加の記録先が不要な場合はこれを使います。

use crate::domain::{HandlerFailure, MessageType, PublishId};
use crate::ports::FailureSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFailureSink;

impl FailureSink for NoopFailureSink {
    fn record(&self, _publish_id: PublishId, _message_type: &MessageType, _failure: &HandlerFailure) {}
}
