//! Realtime channel: STOMP over WebSocket
//!
//! The STOMP codec lives in the `pawmap-stomp` crate.

pub mod backoff;
pub mod events;
pub mod subscriber;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{
    ConnectionState, LocationSubscription, RealtimeEvent, SubscriptionKey, APP_LOCATION_SUBSCRIBE,
    QUEUE_NOTIFICATIONS, TOPIC_POSTS,
};
pub use subscriber::{RealtimeHandle, RealtimeSettings, RealtimeSubscriber};
pub use transport::{Connector, RealtimeTransport, WebSocketConnector};
