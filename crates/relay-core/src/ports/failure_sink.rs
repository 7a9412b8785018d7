//! FailureSink port - 隔離した handler 失敗の記録先
//!
//! dispatcher は handler の失敗を publisher に返さず、warn ログに出したうえでここへ流します。
//!
//! # 実装
//! - NoopFailureSink: 何もしない（デフォルト）
//! - CollectingFailureSink: メモリに貯める（テスト・診断用）
//! - 将来: メトリクスやアラートへの送信

use crate::domain::{HandlerFailure, MessageType, PublishId};

/// FailureSink は handler 失敗を記録
///
/// publish の経路上で同期的に呼ばれるので、重い処理はしないこと。
pub trait FailureSink: Send + Sync {
    fn record(&self, publish_id: PublishId, message_type: &MessageType, failure: &HandlerFailure);
}
