//! MessageType - registry のキー
//!
//! 実行時の型 identity (`TypeId`) をキーにします。表示名 (`type_name`) はログ用で、
//! 比較・ハッシュには使いません。別モジュールに同じ短い名前の型があっても衝突しません。

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    pub fn of<M: 'static>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: type_name::<M>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, for logs only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod catalog {
        pub struct Changed;
    }

    mod pricing {
        pub struct Changed;
    }

    #[test]
    fn same_short_name_in_different_modules_does_not_collide() {
        let a = MessageType::of::<catalog::Changed>();
        let b = MessageType::of::<pricing::Changed>();
        assert_ne!(a, b);
        assert!(a.name().ends_with("catalog::Changed"));
        assert!(b.name().ends_with("pricing::Changed"));
    }

    #[test]
    fn same_type_is_equal() {
        assert_eq!(MessageType::of::<u32>(), MessageType::of::<u32>());
        assert_ne!(MessageType::of::<u32>(), MessageType::of::<i32>());
    }
}
