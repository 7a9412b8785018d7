//! Handler trait - message を処理する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<M>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<M, H> → DynHandler)
//! - クロージャを Handler として扱うアダプタ (FnHandler)

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::message::Message;
use crate::domain::{HandlerError, MessageType};

/// Handler は Message を 1 件処理する
///
/// # 使用例
/// ```ignore
/// struct RecalculatePendingOrders { orders: Arc<dyn OrderRepository> }
///
/// #[async_trait]
/// impl Handler<ProductPriceChanged> for RecalculatePendingOrders {
///     async fn handle(
///         &self,
///         message: Arc<ProductPriceChanged>,
///         cancel: CancellationToken,
///     ) -> Result<(), HandlerError> {
///         self.orders.reprice(message.product_id, message.new_price).await
///             .map_err(HandlerError::from_error)
///     }
/// }
/// ```
///
/// # 契約
/// - message は兄弟 handler と共有される（`Arc<M>`）。変更はできない
/// - `cancel` は助言的なシグナル。長い処理では協調的に確認する
/// - `Err` や panic は dispatcher 側で隔離され、他の handler や publisher には伝播しない
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    async fn handle(&self, message: Arc<M>, cancel: CancellationToken)
    -> Result<(), HandlerError>;

    /// Handler name for logs and failure reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// DynHandler は object-safe な Handler の抽象化
///
/// TypedHandler<M, H> を DynHandler に変換することで、
/// 型の異なる handler を同じ registry に格納できます。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(
        &self,
        message: Arc<dyn Any + Send + Sync>,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError>;

    fn message_type(&self) -> MessageType;

    fn name(&self) -> &str;
}

pub struct TypedHandler<M: Message, H: Handler<M>> {
    handler: H,
    _marker: PhantomData<fn(M)>,
}

impl<M: Message, H: Handler<M>> TypedHandler<M, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message, H: Handler<M>> DynHandler for TypedHandler<M, H> {
    async fn handle_dyn(
        &self,
        message: Arc<dyn Any + Send + Sync>,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        // registry は MessageType ごとに分かれているので、ここで不一致になることはない
        let message = message.downcast::<M>().map_err(|_| {
            HandlerError::failed(format!(
                "message type mismatch: expected {}",
                std::any::type_name::<M>()
            ))
        })?;
        self.handler.handle(message, cancel).await
    }

    fn message_type(&self) -> MessageType {
        MessageType::of::<M>()
    }

    fn name(&self) -> &str {
        self.handler.name()
    }
}

/// FnHandler はクロージャを Handler として登録するためのアダプタ
///
/// ```ignore
/// bus.subscribe_fn::<ProductCreated, _, _>("audit", |msg, _cancel| async move {
///     tracing::info!(product_id = %msg.product_id, "created");
///     Ok(())
/// });
/// ```
pub struct FnHandler<M, F> {
    name: String,
    f: F,
    _marker: PhantomData<fn(M)>,
}

impl<M, F> FnHandler<M, F> {
    pub fn new<Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<M>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), HandlerError>>,
    {
        Self {
            name: name.into(),
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M, F, Fut> Handler<M> for FnHandler<M, F>
where
    M: Message,
    F: Fn(Arc<M>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        message: Arc<M>,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        (self.f)(message, cancel).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::message::fixtures::{Created, Deleted};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct RecordStock(Arc<AtomicU32>);

    #[async_trait]
    impl Handler<Created> for RecordStock {
        async fn handle(
            &self,
            message: Arc<Created>,
            _cancel: CancellationToken,
        ) -> Result<(), HandlerError> {
            self.0.store(message.stock, Ordering::SeqCst);
            Ok(())
        }
    }

    fn created() -> Created {
        Created {
            product_id: 7,
            name: "Keyboard".to_string(),
            price_cents: 4_999,
            stock: 12,
        }
    }

    #[tokio::test]
    async fn typed_handler_downcasts_and_delegates() {
        let seen = Arc::new(AtomicU32::new(0));
        let typed = TypedHandler::<Created, _>::new(RecordStock(seen.clone()));

        let message: Arc<dyn Any + Send + Sync> = Arc::new(created());
        typed
            .handle_dyn(message, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 12);
        assert_eq!(typed.message_type(), MessageType::of::<Created>());
        assert!(typed.name().ends_with("RecordStock"));
    }

    #[tokio::test]
    async fn typed_handler_rejects_foreign_message() {
        let typed = TypedHandler::<Created, _>::new(RecordStock(Arc::new(AtomicU32::new(0))));

        let message: Arc<dyn Any + Send + Sync> = Arc::new(Deleted { product_id: 7 });
        let err = typed
            .handle_dyn(message, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Failed(msg) if msg.contains("mismatch")));
    }

    #[tokio::test]
    async fn fn_handler_uses_given_name() {
        let handler = FnHandler::<Deleted, _>::new(
            "forget-product",
            |msg: Arc<Deleted>, _cancel: CancellationToken| async move {
                if msg.product_id == 0 {
                    return Err(HandlerError::failed("unknown product"));
                }
                Ok(())
            },
        );

        assert_eq!(Handler::<Deleted>::name(&handler), "forget-product");
        handler
            .handle(Arc::new(Deleted { product_id: 1 }), CancellationToken::new())
            .await
            .unwrap();
        let err = handler
            .handle(Arc::new(Deleted { product_id: 0 }), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, HandlerError::failed("unknown product"));
    }
}
