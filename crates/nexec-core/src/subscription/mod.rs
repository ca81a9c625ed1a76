//! Long-lived streaming subscriptions.
//!
//! A subscription opens one stream against a node and feeds every complete
//! [`Message`](crate::chunk::Message) to the caller's `on_item` callback
//! until the stream ends, fails, or the caller unsubscribes. There is no
//! reconnect: a failed stream reports once through `on_error` and stops.

mod error;
mod handle;
mod manager;

pub use error::SubscribeError;
pub use handle::{SubscriptionHandle, SubscriptionId};
pub use manager::SubscriptionManager;
