//! Realtime destinations, subscription payloads and push decoding

use chrono::{DateTime, Utc};
use pawmap_api::{EntityStatus, Position, SearchRadius};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::notifications::{NotificationEvent, PushSource};

/// Broadcast of newly created posts
pub const TOPIC_POSTS: &str = "/topic/posts";
/// Per-user notification queue
pub const QUEUE_NOTIFICATIONS: &str = "/user/queue/notifications";
/// Where location subscription updates are sent
pub const APP_LOCATION_SUBSCRIBE: &str = "/app/location/subscribe";

/// Connection lifecycle reported to the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What a live subscription is keyed on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptionKey {
    pub center: Position,
    pub radius: SearchRadius,
    pub user_id: Option<i64>,
}

/// Body of a `SEND /app/location/subscribe` frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSubscription {
    pub user_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres
    pub radius: u32,
    pub include_own_posts: bool,
}

impl LocationSubscription {
    pub fn new(key: &SubscriptionKey, include_own_posts: bool) -> Self {
        Self {
            user_id: key.user_id,
            latitude: key.center.latitude(),
            longitude: key.center.longitude(),
            radius: key.radius.meters(),
            include_own_posts,
        }
    }
}

/// Output of the realtime subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    State(ConnectionState),
    Notification(NotificationEvent),
    /// A push was dropped because it could not be decoded
    Malformed { destination: String, error: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    #[serde(default, alias = "postId", alias = "notificationId")]
    id: Option<WireId>,
    #[serde(default, alias = "message", alias = "title")]
    content: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

/// Decode a MESSAGE body into an unread notification stamped `received_at`
pub fn parse_push(
    destination: &str,
    body: &str,
    received_at: DateTime<Utc>,
) -> Result<NotificationEvent, PayloadError> {
    let payload: PushPayload = serde_json::from_str(body)?;

    let id = match payload.id {
        Some(WireId::Number(n)) => n.to_string(),
        Some(WireId::Text(s)) if !s.trim().is_empty() => s,
        _ => return Err(PayloadError::MissingField("id")),
    };
    let content = payload
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(PayloadError::MissingField("content"))?;

    let position = match (payload.latitude, payload.longitude) {
        (Some(latitude), Some(longitude)) => Some(
            Position::new(latitude, longitude)
                .map_err(|_| PayloadError::InvalidPosition {
                    latitude,
                    longitude,
                })?,
        ),
        _ => None,
    };

    let source = if destination.starts_with("/user/") {
        PushSource::Personal
    } else {
        PushSource::Broadcast
    };

    Ok(NotificationEvent {
        id,
        content,
        status: payload.status.as_deref().map(EntityStatus::from_wire),
        position,
        source,
        received_at,
        read: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_subscription_payload() {
        let key = SubscriptionKey {
            center: Position::new(37.5, 127.0).unwrap(),
            radius: SearchRadius::new(3).unwrap(),
            user_id: Some(42),
        };
        let json = serde_json::to_value(LocationSubscription::new(&key, true)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "userId": 42,
                "latitude": 37.5,
                "longitude": 127.0,
                "radius": 3000,
                "includeOwnPosts": true
            })
        );
    }

    #[test]
    fn test_parse_broadcast_push() {
        let now = Utc::now();
        let event = parse_push(
            TOPIC_POSTS,
            r#"{"postId": 17, "content": "Maltese spotted near the park", "status": "SIGHTED", "latitude": 37.55, "longitude": 126.98}"#,
            now,
        )
        .unwrap();

        assert_eq!(event.id, "17");
        assert_eq!(event.source, PushSource::Broadcast);
        assert_eq!(event.status, Some(EntityStatus::Sighted));
        assert!(event.position.is_some());
        assert_eq!(event.received_at, now);
        assert!(!event.read);
    }

    #[test]
    fn test_parse_personal_push() {
        let event = parse_push(
            QUEUE_NOTIFICATIONS,
            r#"{"notificationId": "n-1", "message": "Your application was accepted"}"#,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(event.source, PushSource::Personal);
        assert!(event.position.is_none());
        assert!(event.status.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let now = Utc::now();
        assert!(matches!(
            parse_push(TOPIC_POSTS, "not json", now),
            Err(PayloadError::Json(_))
        ));
        assert!(matches!(
            parse_push(TOPIC_POSTS, r#"{"content": "x"}"#, now),
            Err(PayloadError::MissingField("id"))
        ));
        assert!(matches!(
            parse_push(TOPIC_POSTS, r#"{"id": 1, "content": "  "}"#, now),
            Err(PayloadError::MissingField("content"))
        ));
        assert!(matches!(
            parse_push(
                TOPIC_POSTS,
                r#"{"id": 1, "content": "x", "latitude": 95.0, "longitude": 0.0}"#,
                now
            ),
            Err(PayloadError::InvalidPosition { .. })
        ));
    }
}
