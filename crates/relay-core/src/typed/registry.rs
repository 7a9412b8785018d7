//! HandlerRegistry - Handler の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Copy-on-write: 書き込み時に新しいスライスを作り、読み込みは `Arc` の clone だけ
//! - ロックを `.await` をまたいで保持しない

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::message::Message;
use crate::domain::{MessageType, SubscriptionId};

/// 登録済み handler 1 件
#[derive(Clone)]
pub struct HandlerEntry {
    id: SubscriptionId,
    handler: Arc<dyn DynHandler>,
}

impl HandlerEntry {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub fn handler(&self) -> &Arc<dyn DynHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// Point-in-time copy of the handlers registered for one message type.
pub type HandlerSnapshot = Arc<[HandlerEntry]>;

/// HandlerRegistry は MessageType ごとの handler 集合を保持
///
/// # 内部実装
/// - `RwLock<HashMap<MessageType, Arc<[HandlerEntry]>>>`
/// - subscribe / unsubscribe: write lock の中で新しいスライスを組み立てて差し替える
/// - snapshot: read lock の中で `Arc` を clone するだけ
///
/// publish 側が走査しているスライスは不変なので、並行 subscribe によって
/// 走査中の集合が壊れることはありません。追加された handler は次の snapshot から見えます。
///
/// 同じ handler を 2 回 subscribe すると 2 件として登録されます（重複排除しない）。
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<MessageType, HandlerSnapshot>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscribe<M: Message, H: Handler<M>>(&self, handler: H) -> SubscriptionId {
        self.insert(MessageType::of::<M>(), Arc::new(TypedHandler::new(handler)))
    }

    /// 型消去済みの handler を登録
    pub fn insert(&self, message_type: MessageType, handler: Arc<dyn DynHandler>) -> SubscriptionId {
        let id = SubscriptionId::generate();
        let entry = HandlerEntry { id, handler };

        let mut handlers = self.handlers.write();
        let mut next = handlers
            .get(&message_type)
            .map(|current| current.to_vec())
            .unwrap_or_default();
        next.push(entry);
        let count = next.len();
        handlers.insert(message_type, next.into());
        drop(handlers);

        debug!(
            subscription_id = %id,
            message_type = %message_type,
            handlers = count,
            "handler subscribed"
        );
        id
    }

    pub fn unsubscribe<M: Message>(&self, id: SubscriptionId) -> bool {
        self.remove(MessageType::of::<M>(), id)
    }

    /// `id` の登録を 1 件削除。空になった型のエントリは取り除く
    pub fn remove(&self, message_type: MessageType, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(current) = handlers.get(&message_type) else {
            return false;
        };
        if !current.iter().any(|entry| entry.id == id) {
            return false;
        }

        let next: Vec<HandlerEntry> = current
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        if next.is_empty() {
            handlers.remove(&message_type);
        } else {
            handlers.insert(message_type, next.into());
        }
        drop(handlers);

        debug!(subscription_id = %id, message_type = %message_type, "handler unsubscribed");
        true
    }

    pub fn snapshot_for<M: Message>(&self) -> HandlerSnapshot {
        self.snapshot(MessageType::of::<M>())
    }

    /// 現時点の handler 集合のコピー（未登録なら空）
    pub fn snapshot(&self, message_type: MessageType) -> HandlerSnapshot {
        self.handlers
            .read()
            .get(&message_type)
            .cloned()
            .unwrap_or_else(|| Vec::new().into())
    }

    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.handlers
            .read()
            .get(&message_type)
            .map_or(0, |entries| entries.len())
    }

    pub fn registered_types(&self) -> Vec<MessageType> {
        self.handlers.read().keys().copied().collect()
    }

    /// Total number of subscriptions across all message types.
    pub fn len(&self) -> usize {
        self.handlers.read().values().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
