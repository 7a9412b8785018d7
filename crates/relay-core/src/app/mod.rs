//! App - アプリケーション層
//!
//! registry・dispatcher・ports を組み合わせて公開 API を提供します。
//!
//! # 主要コンポーネント
//! - **EventBus**: subscribe / unsubscribe / publish
//! - **Dispatcher**: publish 1 回分の fan-out と失敗の隔離
//! - **BusBuilder**: 起動時のワイヤリングと検証
//! - **BusConfig**: 並行数・timeout・待ち方の設定

pub mod builder;
pub mod bus;
pub mod config;
pub mod dispatch;

pub use self::builder::{BuildError, BusBuilder};
pub use self::bus::EventBus;
pub use self::config::{BusConfig, ConfigError, WaitPolicy};
pub use self::dispatch::PublishOptions;
