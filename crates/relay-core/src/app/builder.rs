//! BusBuilder - EventBus の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::bus::EventBus;
use super::config::{BusConfig, ConfigError};
use crate::domain::{HandlerError, MessageType};
use crate::impls::NoopFailureSink;
use crate::ports::FailureSink;
use crate::typed::{FnHandler, Handler, HandlerRegistry, Message};

/// BusBuilder は起動時に EventBus を組み立てる
///
/// # 使用例
/// ```ignore
/// let bus = BusBuilder::new()
///     .config(config)
///     .subscribe::<ProductPriceChanged, _>(RecalculatePendingOrders::new(orders.clone()))
///     .expect::<ProductPriceChanged>()
///     .expect::<ProductDeleted>()
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect() で「必ず listener がいるべき」message 型を宣言
/// - build() 時に宣言した型すべてに handler が登録されているかチェック
/// - 不足があれば BuildError を返す（配線漏れのまま起動しない）
pub struct BusBuilder {
    config: BusConfig,
    registry: HandlerRegistry,
    sink: Option<Arc<dyn FailureSink>>,
    expected: Vec<MessageType>,
}

/// BuildError は EventBus 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid bus config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Missing subscribers for message types: {0:?}. These types were expected but have no handler.")]
    MissingSubscribers(Vec<String>),
}

impl BusBuilder {
    pub fn new() -> Self {
        Self {
            config: BusConfig::default(),
            registry: HandlerRegistry::new(),
            sink: None,
            expected: Vec::new(),
        }
    }

    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// handler 失敗の記録先（未指定なら NoopFailureSink）
    pub fn failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handler を登録
    ///
    /// 起動時の登録はプロセスの寿命と同じなので SubscriptionId は返しません。
    /// 後で外す必要がある handler は build 後に `EventBus::subscribe` で登録してください。
    pub fn subscribe<M: Message, H: Handler<M>>(self, handler: H) -> Self {
        self.registry.subscribe::<M, H>(handler);
        self
    }

    pub fn subscribe_fn<M, F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        M: Message,
        F: Fn(Arc<M>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe::<M, _>(FnHandler::new(name, f))
    }

    /// listener が必須の message 型を宣言
    pub fn expect<M: Message>(mut self) -> Self {
        let message_type = MessageType::of::<M>();
        if !self.expected.contains(&message_type) {
            self.expected.push(message_type);
        }
        self
    }

    /// # 検証
    /// - BusConfig::validate()
    /// - expect() で宣言した型が全て登録されているか
    pub fn build(self) -> Result<EventBus, BuildError> {
        self.config.validate()?;

        let missing: Vec<String> = self
            .expected
            .iter()
            .filter(|message_type| self.registry.handler_count(**message_type) == 0)
            .map(|message_type| message_type.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingSubscribers(missing));
        }

        let sink = self.sink.unwrap_or_else(|| Arc::new(NoopFailureSink));
        Ok(EventBus::from_parts(self.config, self.registry, sink))
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
