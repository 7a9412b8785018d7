//! EventBus - subscribe / publish の公開 API
//!
//! # 使い方
//! プロセス起動時に 1 つ作り、clone したハンドルを producer / consumer に渡します
//! （グローバルな static は使わない）。clone は同じ registry を共有します。
//!
//! ```ignore
//! let bus = EventBus::new();
//! bus.subscribe::<ProductPriceChanged, _>(RecalculatePendingOrders::new(orders));
//!
//! let report = bus.publish(ProductPriceChanged { .. }).await;
//! assert!(report.failures.is_empty());
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::builder::BusBuilder;
use super::config::{BusConfig, ConfigError};
use super::dispatch::{Dispatcher, PublishOptions};
use crate::domain::{HandlerError, MessageType, PublishReport, SubscriptionId};
use crate::impls::NoopFailureSink;
use crate::observability::BusCounts;
use crate::ports::FailureSink;
use crate::typed::{FnHandler, Handler, HandlerRegistry, Message};

/// In-process typed publish/subscribe dispatcher.
///
/// - 配送は厳密な型一致のみ
/// - 同じ型の handler は並行に実行され、publish は全員の完了を待つ
/// - handler の失敗は隔離され、publish の戻り値はエラーにならない
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    registry: HandlerRegistry,
    dispatcher: Dispatcher,
}

impl EventBus {
    /// デフォルト設定の EventBus
    pub fn new() -> Self {
        Self::from_parts(
            BusConfig::default(),
            HandlerRegistry::new(),
            Arc::new(NoopFailureSink),
        )
    }

    pub fn with_config(config: BusConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(
            config,
            HandlerRegistry::new(),
            Arc::new(NoopFailureSink),
        ))
    }

    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    pub(crate) fn from_parts(
        config: BusConfig,
        registry: HandlerRegistry,
        sink: Arc<dyn FailureSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                dispatcher: Dispatcher::new(config, sink),
            }),
        }
    }

    // ========================================
    // Subscription API
    // ========================================

    /// Handler を登録。失敗しない・重複排除しない
    ///
    /// publish の途中で登録された handler は、その publish では呼ばれないことがあります。
    /// 次の publish からは必ず呼ばれます。
    pub fn subscribe<M: Message, H: Handler<M>>(&self, handler: H) -> SubscriptionId {
        self.inner.registry.subscribe::<M, H>(handler)
    }

    /// クロージャを handler として登録
    pub fn subscribe_fn<M, F, Fut>(&self, name: impl Into<String>, f: F) -> SubscriptionId
    where
        M: Message,
        F: Fn(Arc<M>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe::<M, _>(FnHandler::new(name, f))
    }

    /// 登録を 1 件削除。見つからなければ false
    pub fn unsubscribe<M: Message>(&self, id: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe::<M>(id)
    }

    pub fn handler_count<M: Message>(&self) -> usize {
        self.inner.registry.handler_count(MessageType::of::<M>())
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    // ========================================
    // Publisher
    // ========================================

    /// message の型に登録された全 handler に配送し、全員の完了を待つ
    pub async fn publish<M: Message>(&self, message: M) -> PublishReport {
        self.publish_shared(Arc::new(message), PublishOptions::default())
            .await
    }

    pub async fn publish_with<M: Message>(
        &self,
        message: M,
        options: PublishOptions,
    ) -> PublishReport {
        self.publish_shared(Arc::new(message), options).await
    }

    /// 既に `Arc` に入っている message を publish（コピーしない）
    pub async fn publish_shared<M: Message>(
        &self,
        message: Arc<M>,
        options: PublishOptions,
    ) -> PublishReport {
        let message_type = MessageType::of::<M>();
        let snapshot = self.inner.registry.snapshot(message_type);
        let message: Arc<dyn Any + Send + Sync> = message;
        self.inner
            .dispatcher
            .dispatch(message_type, snapshot, message, options)
            .await
    }

    /// 順番に publish する。各 publish の完了を待ってから次へ進むので、
    /// この呼び出し元から見た順序は保たれる
    pub async fn publish_all<M, I>(&self, messages: I) -> Vec<PublishReport>
    where
        M: Message,
        I: IntoIterator<Item = M>,
    {
        let mut reports = Vec::new();
        for message in messages {
            reports.push(self.publish(message).await);
        }
        reports
    }

    pub fn config(&self) -> &BusConfig {
        self.inner.dispatcher.config()
    }

    pub fn counts(&self) -> BusCounts {
        self.inner.dispatcher.stats().counts()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", self.config())
            .field("subscriptions", &self.inner.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::message::fixtures::{Created, Deleted, PriceChanged};
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_handler(
        bus: &EventBus,
        counter: &Arc<AtomicUsize>,
    ) -> SubscriptionId {
        let counter = Arc::clone(counter);
        bus.subscribe_fn::<Created, _, _>("count", move |_msg, _cancel| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn created() -> Created {
        Created {
            product_id: 42,
            name: "Desk".to_string(),
            price_cents: 25_000,
            stock: 4,
        }
    }

    #[rstest]
    #[case::none(0)]
    #[case::one(1)]
    #[case::many(16)]
    #[tokio::test]
    async fn publish_invokes_every_handler_exactly_once(#[case] handlers: usize) {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..handlers {
            counter_handler(&bus, &counter);
        }

        let report = bus.publish(created()).await;

        assert_eq!(counter.load(Ordering::SeqCst), handlers);
        assert_eq!(report.handlers, handlers);
        assert_eq!(report.completed, handlers);
        assert!(report.all_completed());
    }

    #[tokio::test]
    async fn exact_type_only() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        counter_handler(&bus, &counter);

        let report = bus.publish(Deleted { product_id: 42 }).await;

        assert!(report.is_noop());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribed_handler_is_not_invoked() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = counter_handler(&bus, &counter);
        counter_handler(&bus, &counter);

        assert!(bus.unsubscribe::<Created>(id));
        bus.publish(created()).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count::<Created>(), 1);
    }

    #[tokio::test]
    async fn clones_share_one_registry() {
        let bus = EventBus::new();
        let producer = bus.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        counter_handler(&bus, &counter);

        producer.publish(created()).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_all_keeps_producer_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe_fn::<PriceChanged, _, _>("record", move |msg, _cancel| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push(msg.new_price_cents);
                    Ok(())
                }
            });
        }

        let reports = bus
            .publish_all((1..=5).map(|i| PriceChanged {
                product_id: 1,
                old_price_cents: i * 100,
                new_price_cents: (i + 1) * 100,
            }))
            .await;

        assert_eq!(reports.len(), 5);
        assert_eq!(*seen.lock(), vec![200, 300, 400, 500, 600]);
    }

    #[tokio::test]
    async fn handler_subscribed_from_inside_a_handler_sees_next_publish() {
        let bus = EventBus::new();
        let late_calls = Arc::new(AtomicUsize::new(0));
        {
            let inner_bus = bus.clone();
            let late_calls = Arc::clone(&late_calls);
            bus.subscribe_fn::<Created, _, _>("subscribes-late", move |_msg, _cancel| {
                let inner_bus = inner_bus.clone();
                let late_calls = Arc::clone(&late_calls);
                async move {
                    let late_calls = Arc::clone(&late_calls);
                    inner_bus.subscribe_fn::<Created, _, _>("late", move |_msg, _cancel| {
                        let late_calls = Arc::clone(&late_calls);
                        async move {
                            late_calls.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    });
                    Ok(())
                }
            });
        }

        let first = bus.publish(created()).await;
        assert_eq!(first.handlers, 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        let second = bus.publish(created()).await;
        assert_eq!(second.handlers, 2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn counts_track_publishes() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        counter_handler(&bus, &counter);

        bus.publish(created()).await;
        bus.publish(Deleted { product_id: 1 }).await;

        let counts = bus.counts();
        assert_eq!(counts.publishes, 2);
        assert_eq!(counts.noop_publishes, 1);
        assert_eq!(counts.completed, 1);
    }

    #[test]
    fn with_config_rejects_invalid_config() {
        let err = EventBus::with_config(BusConfig::default().with_max_concurrent_handlers(0))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroConcurrency);
    }
}
