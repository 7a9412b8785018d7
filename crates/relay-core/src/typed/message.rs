//! Message trait - publish できる型の定義
//!
//! # 学習ポイント
//! - Trait bounds の組み合わせ (Send + Sync + 'static)
//! - `TypeId` による型の同一性（名前ではなく型で区別）

use crate::domain::MessageType;

/// Message は publish / subscribe の単位になる型
///
/// # 使用例
/// ```ignore
/// #[derive(Debug, Clone)]
/// struct ProductPriceChanged {
///     product_id: Uuid,
///     old_price: Decimal,
///     new_price: Decimal,
/// }
///
/// impl Message for ProductPriceChanged {}
/// ```
///
/// # Trait Bounds
/// - `Send + Sync`: 複数の handler タスクから `Arc<Self>` で共有するため
/// - `'static`: `TypeId` を取得し、spawn したタスクに渡すため
///
/// 配送は厳密な型一致のみです。ある型のために subscribe した handler は、
/// 関連する別の型（ラッパー型など）の publish では呼ばれません。
pub trait Message: Send + Sync + 'static {
    fn message_type() -> MessageType
    where
        Self: Sized,
    {
        MessageType::of::<Self>()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{Created, Deleted};
    use super::*;

    #[test]
    fn message_type_is_per_concrete_type() {
        assert_eq!(Created::message_type(), MessageType::of::<Created>());
        assert_ne!(Created::message_type(), Deleted::message_type());
    }
}
