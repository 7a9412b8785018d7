//! Domain model (IDs, message-type key, handler errors, publish reports).

pub mod errors;
pub mod ids;
pub mod message_type;
pub mod outcome;

pub use self::errors::HandlerError;
pub use self::ids::{Id, IdMarker, PublishId, SubscriptionId};
pub use self::message_type::MessageType;
pub use self::outcome::{HandlerFailure, InvocationOutcome, PublishReport};
