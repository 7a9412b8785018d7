//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **NoopFailureSink**: デフォルト（記録しない）
//! - **CollectingFailureSink**: テスト・診断用

pub mod collecting_sink;
pub mod noop_sink;

pub use self::collecting_sink::{CollectingFailureSink, RecordedFailure};
pub use self::noop_sink::NoopFailureSink;
