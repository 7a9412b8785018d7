//! Typed - 型付き Message / Handler API
//!
//! Message の型そのものを registry のキーにすることで、
//! 名前の typo や名前の衝突による誤配送を型で排除します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Message` trait, `Handler<M>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod message;
pub mod registry;

pub use self::handler::{DynHandler, FnHandler, Handler, TypedHandler};
pub use self::message::Message;
pub use self::registry::{HandlerEntry, HandlerRegistry, HandlerSnapshot};
