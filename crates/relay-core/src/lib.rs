//! relay-core
//!
//! In-process typed publish/subscribe dispatcher.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message_type, errors, outcome）
//! - **typed**: 型付き API（Message trait, Handler trait, HandlerRegistry）
//! - **ports**: 抽象化レイヤー（FailureSink）
//! - **impls**: ports の実装（NoopFailureSink, CollectingFailureSink）
//! - **app**: 公開 API（EventBus, BusBuilder, BusConfig, PublishOptions）
//! - **observability**: カウンタ

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

pub use app::{BuildError, BusBuilder, BusConfig, ConfigError, EventBus, PublishOptions, WaitPolicy};
pub use domain::{HandlerError, HandlerFailure, MessageType, PublishReport, SubscriptionId};
pub use error::RelayError;
pub use typed::{Handler, Message};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
