//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型ごとに区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 生成順序でソートできる（ログの突き合わせに便利）
//! - **調整なしで生成可能**: subscribe / publish の呼び出し元がロックなしで採番できる
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供し、`T` はコンパイル時だけ使うマーカー型です。
//! `SubscriptionId` と `PublishId` は混同できません。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"sub-", "pub-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// ```ignore
/// let sub: SubscriptionId = Id::generate();
/// let publish: PublishId = Id::generate();
/// // sub と publish は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 新しい ID を採番
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Subscription のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subscription {}

impl IdMarker for Subscription {
    fn prefix() -> &'static str {
        "sub-"
    }
}

/// Publish のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Publish {}

impl IdMarker for Publish {
    fn prefix() -> &'static str {
        "pub-"
    }
}

// ========================================
// Type Alias
// ========================================

/// Identifier of one registered handler (the handle `unsubscribe` takes).
pub type SubscriptionId = Id<Subscription>;

/// Identifier of one publish call (attached to logs and reports).
pub type PublishId = Id<Publish>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let sub = SubscriptionId::from_ulid(ulid1);
        let publish = PublishId::from_ulid(ulid2);

        assert_eq!(sub.as_ulid(), ulid1);
        assert_eq!(publish.as_ulid(), ulid2);

        assert!(sub.to_string().starts_with("sub-"));
        assert!(publish.to_string().starts_with("pub-"));
        // let _: SubscriptionId = publish; // <- does not compile
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_serialize_as_plain_ulid() {
        let id = PublishId::generate();
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, format!("\"{}\"", id.as_ulid()));
        let deserialized: PublishId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<SubscriptionId>(), size_of::<Ulid>());
        assert_eq!(size_of::<PublishId>(), size_of::<Ulid>());
    }
}
