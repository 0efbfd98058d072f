//! Realtime subscriber with automatic reconnection
//!
//! A background task owns the broker connection. It performs the STOMP
//! handshake, subscribes to the post broadcast and the personal queue, and
//! publishes one location subscription per key change over the open
//! connection. A lost connection is retried with exponential backoff and the
//! latest key is re-sent on reconnect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pawmap_stomp::{Command, Frame, FrameError, FrameParser};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::MapConfig;
use crate::error::RealtimeError;
use crate::realtime::backoff::ExponentialBackoff;
use crate::realtime::events::{
    parse_push, ConnectionState, LocationSubscription, RealtimeEvent, SubscriptionKey,
    APP_LOCATION_SUBSCRIBE, QUEUE_NOTIFICATIONS, TOPIC_POSTS,
};
use crate::realtime::transport::{Connector, RealtimeTransport};

/// How long shutdown waits for DISCONNECT to go out
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Broker session settings
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    /// Value of the CONNECT `host` header
    pub host: String,
    pub auth_token: Option<String>,
    pub include_own_posts: bool,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub reconnect_multiplier: f64,
    pub connect_timeout: Duration,
}

impl RealtimeSettings {
    pub fn from_config(config: &MapConfig, auth_token: Option<String>) -> Self {
        Self {
            host: config.broker_host(),
            auth_token,
            include_own_posts: config.include_own_posts,
            reconnect_initial: Duration::from_millis(config.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(config.reconnect_max_ms),
            reconnect_multiplier: config.reconnect_multiplier,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
        }
    }
}

#[derive(Debug)]
enum SubscriberCommand {
    UpdateKey(SubscriptionKey),
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Lost(RealtimeError),
}

/// Control handle of a running subscriber. Dropping it aborts the task.
#[derive(Debug)]
pub struct RealtimeHandle {
    commands: mpsc::UnboundedSender<SubscriberCommand>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeHandle {
    /// Re-key the subscription. Sent at once if connected, else on reconnect.
    pub fn update_key(&self, key: SubscriptionKey) {
        if self
            .commands
            .send(SubscriberCommand::UpdateKey(key))
            .is_err()
        {
            tracing::debug!("Realtime subscriber already stopped");
        }
    }

    /// Send DISCONNECT, close the connection and stop reconnecting
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(SubscriberCommand::Shutdown);
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                tracing::warn!("Realtime subscriber did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// STOMP subscriber that keeps one location subscription alive
#[derive(Debug)]
pub struct RealtimeSubscriber {
    connector: Arc<dyn Connector>,
    settings: RealtimeSettings,
}

impl RealtimeSubscriber {
    pub fn new(connector: Arc<dyn Connector>, settings: RealtimeSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Spawn the connection task. Events are delivered on `events`.
    pub fn start(
        self,
        initial_key: Option<SubscriptionKey>,
        events: mpsc::UnboundedSender<RealtimeEvent>,
    ) -> RealtimeHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            self.run_loop(initial_key, rx, events).await;
        });
        RealtimeHandle {
            commands,
            task: Some(task),
        }
    }

    async fn run_loop(
        self,
        mut key: Option<SubscriptionKey>,
        mut commands: mpsc::UnboundedReceiver<SubscriberCommand>,
        events: mpsc::UnboundedSender<RealtimeEvent>,
    ) {
        let mut backoff = ExponentialBackoff::new(
            self.settings.reconnect_initial,
            self.settings.reconnect_max,
            self.settings.reconnect_multiplier,
        );

        loop {
            let _ = events.send(RealtimeEvent::State(ConnectionState::Connecting));

            match self
                .run_session(&mut key, &mut commands, &events, &mut backoff)
                .await
            {
                SessionEnd::Shutdown => {
                    let _ = events.send(RealtimeEvent::State(ConnectionState::Disconnected));
                    break;
                }
                SessionEnd::Lost(e) => {
                    let _ = events.send(RealtimeEvent::State(ConnectionState::Disconnected));

                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        reconnect_in_ms = delay.as_millis(),
                        "Realtime connection lost, will reconnect"
                    );
                    if !wait_for_retry(delay, &mut key, &mut commands).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("Realtime subscriber stopped");
    }

    async fn run_session(
        &self,
        key: &mut Option<SubscriptionKey>,
        commands: &mut mpsc::UnboundedReceiver<SubscriberCommand>,
        events: &mpsc::UnboundedSender<RealtimeEvent>,
        backoff: &mut ExponentialBackoff,
    ) -> SessionEnd {
        let (mut transport, mut parser) = match self.connect(key, commands).await {
            Ok(Some(session)) => session,
            Ok(None) => return SessionEnd::Shutdown,
            Err(e) => return SessionEnd::Lost(e),
        };

        backoff.reset();
        let _ = events.send(RealtimeEvent::State(ConnectionState::Connected));
        tracing::info!("Connected to realtime broker");

        for (id, destination) in [TOPIC_POSTS, QUEUE_NOTIFICATIONS].into_iter().enumerate() {
            let frame = Frame::new(Command::Subscribe)
                .header("id", format!("sub-{id}"))
                .header("destination", destination)
                .header("ack", "auto");
            if let Err(e) = transport.send_text(frame.encode()).await {
                return SessionEnd::Lost(e);
            }
        }

        let mut sent_key = None;
        if let Some(current) = *key {
            if let Err(e) = self.send_location(transport.as_mut(), &current).await {
                return SessionEnd::Lost(e);
            }
            sent_key = Some(current);
        }

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SubscriberCommand::UpdateKey(next)) => {
                        *key = Some(next);
                        if sent_key != Some(next) {
                            if let Err(e) = self.send_location(transport.as_mut(), &next).await {
                                return SessionEnd::Lost(e);
                            }
                            sent_key = Some(next);
                        }
                    }
                    Some(SubscriberCommand::Shutdown) | None => {
                        let disconnect = Frame::new(Command::Disconnect).header("receipt", "disconnect");
                        if let Err(e) = transport.send_text(disconnect.encode()).await {
                            tracing::debug!(error = %e, "DISCONNECT not delivered");
                        }
                        transport.close().await;
                        return SessionEnd::Shutdown;
                    }
                },
                chunk = transport.next_chunk() => match chunk {
                    None => return SessionEnd::Lost(RealtimeError::Closed),
                    Some(Err(e)) => return SessionEnd::Lost(e),
                    Some(Ok(bytes)) => {
                        for frame in parser.feed(&bytes) {
                            match frame {
                                Ok(frame) => {
                                    if let Err(e) = handle_frame(frame, events) {
                                        return SessionEnd::Lost(e);
                                    }
                                }
                                Err(e @ FrameError::FrameTooLarge(_)) => {
                                    return SessionEnd::Lost(e.into());
                                }
                                Err(e) => tracing::warn!(error = %e, "Skipping undecodable frame"),
                            }
                        }
                    }
                },
            }
        }
    }

    /// Open a transport and complete the STOMP handshake.
    ///
    /// Key updates that arrive meanwhile are kept; `Ok(None)` means shutdown
    /// was requested.
    async fn connect(
        &self,
        key: &mut Option<SubscriptionKey>,
        commands: &mut mpsc::UnboundedReceiver<SubscriberCommand>,
    ) -> Result<Option<(Box<dyn RealtimeTransport>, FrameParser)>, RealtimeError> {
        let timeout = self.settings.connect_timeout;
        let handshake = tokio::time::timeout(timeout, self.handshake());
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                result = &mut handshake => {
                    return match result {
                        Ok(Ok(session)) => Ok(Some(session)),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(RealtimeError::Timeout(timeout.as_millis() as u64)),
                    };
                }
                command = commands.recv() => match command {
                    Some(SubscriberCommand::UpdateKey(next)) => *key = Some(next),
                    Some(SubscriberCommand::Shutdown) | None => return Ok(None),
                },
            }
        }
    }

    async fn handshake(&self) -> Result<(Box<dyn RealtimeTransport>, FrameParser), RealtimeError> {
        let mut transport = self.connector.connect().await?;
        transport.send_text(self.connect_frame().encode()).await?;

        let mut parser = FrameParser::new();
        loop {
            let chunk = match transport.next_chunk().await {
                Some(chunk) => chunk?,
                None => return Err(RealtimeError::Closed),
            };
            for frame in parser.feed(&chunk) {
                let frame = frame?;
                match frame.command {
                    Command::Connected => {
                        tracing::debug!(
                            version = frame.get_header("version"),
                            "STOMP session established"
                        );
                        return Ok((transport, parser));
                    }
                    Command::Error => return Err(RealtimeError::Broker(error_message(&frame))),
                    other => {
                        return Err(RealtimeError::Protocol(format!(
                            "expected CONNECTED, got {other}"
                        )))
                    }
                }
            }
        }
    }

    fn connect_frame(&self) -> Frame {
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", self.settings.host.as_str())
            .header("heart-beat", "0,0");
        match &self.settings.auth_token {
            Some(token) => frame.header("Authorization", format!("Bearer {token}")),
            None => frame,
        }
    }

    async fn send_location(
        &self,
        transport: &mut dyn RealtimeTransport,
        key: &SubscriptionKey,
    ) -> Result<(), RealtimeError> {
        let payload = LocationSubscription::new(key, self.settings.include_own_posts);
        let body =
            serde_json::to_string(&payload).map_err(|e| RealtimeError::Protocol(e.to_string()))?;
        let frame = Frame::new(Command::Send)
            .header("destination", APP_LOCATION_SUBSCRIBE)
            .header("content-type", "application/json")
            .body(body);
        transport.send_text(frame.encode()).await?;

        tracing::info!(
            latitude = payload.latitude,
            longitude = payload.longitude,
            radius_m = payload.radius,
            "Location subscription sent"
        );
        Ok(())
    }
}

/// Sleep out the reconnect delay, still tracking key updates.
/// Returns false if shutdown was requested.
async fn wait_for_retry(
    delay: Duration,
    key: &mut Option<SubscriptionKey>,
    commands: &mut mpsc::UnboundedReceiver<SubscriberCommand>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(SubscriberCommand::UpdateKey(next)) => *key = Some(next),
                Some(SubscriberCommand::Shutdown) | None => return false,
            },
        }
    }
}

fn error_message(frame: &Frame) -> String {
    frame
        .get_header("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.trim().to_string())
}

/// Route one inbound frame. An ERROR frame ends the session.
fn handle_frame(
    frame: Frame,
    events: &mpsc::UnboundedSender<RealtimeEvent>,
) -> Result<(), RealtimeError> {
    match frame.command {
        Command::Message => {
            let destination = frame.get_header("destination").unwrap_or_default().to_string();
            match parse_push(&destination, &frame.body, Utc::now()) {
                Ok(notification) => {
                    tracing::debug!(id = %notification.id, %destination, "Push received");
                    let _ = events.send(RealtimeEvent::Notification(notification));
                }
                Err(e) => {
                    tracing::warn!(error = %e, %destination, "Dropping malformed push");
                    let _ = events.send(RealtimeEvent::Malformed {
                        destination,
                        error: e.to_string(),
                    });
                }
            }
            Ok(())
        }
        Command::Error => Err(RealtimeError::Broker(error_message(&frame))),
        other => {
            tracing::debug!(command = %other, "Ignoring frame");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::PushSource;
    use crate::realtime::testing::MockBroker;
    use pawmap_api::{Position, SearchRadius};

    fn make_settings() -> RealtimeSettings {
        RealtimeSettings {
            host: "localhost".to_string(),
            auth_token: Some("tok".to_string()),
            include_own_posts: false,
            reconnect_initial: Duration::from_millis(5000),
            reconnect_max: Duration::from_millis(30000),
            reconnect_multiplier: 2.0,
            connect_timeout: Duration::from_millis(10000),
        }
    }

    fn make_key(latitude: f64, km: i64) -> SubscriptionKey {
        SubscriptionKey {
            center: Position::new(latitude, 127.0).unwrap(),
            radius: SearchRadius::new(km).unwrap(),
            user_id: Some(7),
        }
    }

    fn start(
        broker: &Arc<MockBroker>,
        key: Option<SubscriptionKey>,
    ) -> (RealtimeHandle, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = RealtimeSubscriber::new(broker.connector(), make_settings());
        (subscriber.start(key, tx), rx)
    }

    async fn wait_for_state(rx: &mut mpsc::UnboundedReceiver<RealtimeEvent>, state: ConnectionState) {
        loop {
            if let RealtimeEvent::State(s) = rx.recv().await.unwrap() {
                if s == state {
                    return;
                }
            }
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_and_initial_subscriptions() {
        let broker = MockBroker::new();
        let (_handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));

        wait_for_state(&mut rx, ConnectionState::Connected).await;
        settle().await;

        let connect = &broker.sent_with(Command::Connect)[0];
        assert_eq!(connect.get_header("accept-version"), Some("1.2"));
        assert_eq!(connect.get_header("host"), Some("localhost"));
        assert_eq!(connect.get_header("Authorization"), Some("Bearer tok"));

        let destinations: Vec<String> = broker
            .sent_with(Command::Subscribe)
            .iter()
            .filter_map(|f| f.get_header("destination").map(str::to_string))
            .collect();
        assert_eq!(destinations, vec![TOPIC_POSTS, QUEUE_NOTIFICATIONS]);

        let locations = broker.location_payloads();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0]["radius"], 3000);
        assert_eq!(locations[0]["userId"], 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_subscription_per_key_change() {
        let broker = MockBroker::new();
        let (handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        handle.update_key(make_key(37.6, 3));
        handle.update_key(make_key(37.6, 3));
        handle.update_key(make_key(37.6, 5));
        settle().await;

        let locations = broker.location_payloads();
        assert_eq!(locations.len(), 3);
        assert_eq!(locations[2]["radius"], 5000);
        assert_eq!(broker.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_reconnects_once_and_resubscribes() {
        let broker = MockBroker::new();
        let (_handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        broker.drop_connection();
        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        wait_for_state(&mut rx, ConnectionState::Connected).await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(broker.connects(), 2);
        assert_eq!(broker.sent_with(Command::Subscribe).len(), 4);
        let locations = broker.location_payloads();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0], locations[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_change_while_disconnected_applies_on_reconnect() {
        let broker = MockBroker::new();
        broker.refuse_next(1);
        let (handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));

        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        handle.update_key(make_key(37.7, 4));
        wait_for_state(&mut rx, ConnectionState::Connected).await;
        settle().await;

        let locations = broker.location_payloads();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0]["latitude"], 37.7);
        assert_eq!(locations[0]["radius"], 4000);
        assert_eq!(broker.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_frame_triggers_reconnect() {
        let broker = MockBroker::new();
        let (_handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        broker.push(Frame::new(Command::Error).header("message", "session expired"));
        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        assert_eq!(broker.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_frame_drops_session_and_reconnects() {
        let broker = MockBroker::new();
        let (_handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        broker.push_raw(b"MESSAGE\ncontent-length:18446744073709551615\n\nabc\0");
        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        wait_for_state(&mut rx, ConnectionState::Connected).await;
        settle().await;

        assert_eq!(broker.connects(), 2);
        assert_eq!(broker.location_payloads().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushes_become_notifications() {
        let broker = MockBroker::new();
        let (_handle, mut rx) = start(&broker, None);
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        broker.push(
            Frame::new(Command::Message)
                .header("destination", TOPIC_POSTS)
                .header("subscription", "sub-0")
                .body(r#"{"postId": 3, "content": "Found a cat"}"#),
        );
        broker.push(
            Frame::new(Command::Message)
                .header("destination", QUEUE_NOTIFICATIONS)
                .body("{broken"),
        );

        match rx.recv().await.unwrap() {
            RealtimeEvent::Notification(n) => {
                assert_eq!(n.id, "3");
                assert_eq!(n.source, PushSource::Broadcast);
                assert!(!n.read);
            }
            other => panic!("unexpected {other:?}"),
        }
        match rx.recv().await.unwrap() {
            RealtimeEvent::Malformed { destination, .. } => {
                assert_eq!(destination, QUEUE_NOTIFICATIONS);
            }
            other => panic!("unexpected {other:?}"),
        }
        // No key yet: nothing published
        assert!(broker.location_payloads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_sends_disconnect_and_stops() {
        let broker = MockBroker::new();
        let (handle, mut rx) = start(&broker, Some(make_key(37.5, 3)));
        wait_for_state(&mut rx, ConnectionState::Connected).await;

        handle.shutdown().await;

        assert_eq!(broker.sent_with(Command::Disconnect).len(), 1);
        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(broker.connects(), 1);
    }
}
