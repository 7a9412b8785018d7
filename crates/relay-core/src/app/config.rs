//! BusConfig - dispatcher の設定
//!
//! 読み込み元（環境変数・ファイル）はアプリ側で決めます。ここでは型と検証だけを持ちます。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

/// publish がキャンセルを観測したときの待ち方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// 開始済みの handler が全て終わるまで待つ（未開始のものは skip）
    #[default]
    Drain,

    /// キャンセルを観測した時点で戻る。実行中の handler は止めずに切り離す
    ReturnOnCancel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Upper bound on concurrently running handlers of one publish call.
    /// `None` runs every handler of the snapshot at once.
    pub max_concurrent_handlers: Option<usize>,

    /// Default publish timeout in milliseconds. When it elapses the publish
    /// is cancelled: not-yet-started handlers are skipped.
    pub publish_timeout_ms: Option<u64>,

    pub wait_policy: WaitPolicy,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_concurrent_handlers must be at least 1")]
    ZeroConcurrency,

    #[error("max_concurrent_handlers must be at most {max}, got {limit}")]
    ConcurrencyTooLarge { limit: usize, max: usize },

    #[error("publish_timeout_ms must be greater than 0")]
    ZeroTimeout,
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_concurrent_handlers {
            Some(0) => return Err(ConfigError::ZeroConcurrency),
            Some(limit) if limit > Semaphore::MAX_PERMITS => {
                return Err(ConfigError::ConcurrencyTooLarge {
                    limit,
                    max: Semaphore::MAX_PERMITS,
                });
            }
            _ => {}
        }
        if self.publish_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn publish_timeout(&self) -> Option<Duration> {
        self.publish_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.max_concurrent_handlers = Some(limit);
        self
    }

    /// ミリ秒未満の端数は切り上げる
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        let mut millis = timeout.as_millis();
        if timeout.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        self.publish_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }
}
