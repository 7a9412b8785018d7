//! Ports - 抽象化レイヤー
//!
//! dispatcher が外部（ログ基盤、メトリクス、テストの観測点）に依存する部分を
//! trait として切り出します。

pub mod failure_sink;

pub use self::failure_sink::FailureSink;
