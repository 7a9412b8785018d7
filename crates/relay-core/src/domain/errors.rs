//! Errors - handler 実行エラーの分類
//!
//! handler の失敗は publish の呼び出し元へは伝播しません（isolation）。
//! ここで定義する型は report とログに載せるためのものです。

use serde::{Deserialize, Serialize};

/// HandlerError は 1 回の handler 呼び出しの失敗
///
/// # 分類
/// - Failed: handler が `Err` を返した
/// - Panicked: handler が panic した（spawn 先で捕捉済み）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wraps any error returned by the handler's own collaborators.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::Failed(err.to_string())
    }

    /// Builds a `Panicked` error from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_rendered() {
        let err = HandlerError::from_panic(Box::new("boom"));
        assert_eq!(err, HandlerError::Panicked("boom".to_string()));

        let err = HandlerError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "handler panicked: owned boom");

        let err = HandlerError::from_panic(Box::new(42_u8));
        assert!(err.is_panic());
    }

    #[test]
    fn handler_error_is_tagged_enum() {
        let v = serde_json::to_value(HandlerError::failed("db down")).unwrap();
        assert_eq!(v["kind"], "failed");
        assert_eq!(v["message"], "db down");
    }
}
