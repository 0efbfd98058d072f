//! Map page runtime
//!
//! [`MapPage`] owns every component of one map page and runs them on a
//! single task: user events, debounced fetches, fetch completions, realtime
//! events, geolocation results and the animation / reveal / toast timers all
//! go through one `select!` loop, so state is only touched between awaits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pawmap_api::{ApiClient, Entity, EntityCategory, EntityId, Position, SearchRadius};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::cache::{fetch_entities, CacheUpdate, EntityCache, FetchOutcome};
use crate::config::MapConfig;
use crate::debounce::{Debouncer, FetchMode, Fired};
use crate::error::GeolocationError;
use crate::notifications::{NotificationCenter, NotificationEvent, NotificationKey, ToastTicket};
use crate::overlay::{MapLayer, MarkerDescriptor, OverlayRenderer};
use crate::position::{Geolocator, PositionStore, RadiusRequest, ViewportKey};
use crate::realtime::{
    ConnectionState, RealtimeEvent, RealtimeHandle, RealtimeSubscriber, SubscriptionKey,
};
use crate::selection::{Panel, RevealTicket, SelectionController};

/// Inputs to a running page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Map dragged to a new center
    Drag(Position),
    /// Zoom level changed; rescales markers only
    Zoom(f64),
    /// Radius slider moved
    RequestRadius(SearchRadius),
    /// "My location" pressed
    Locate,
    MarkerClicked(EntityId),
    MarkerImageFailed(EntityId),
    OpenList,
    OpenGuide,
    ClosePanel,
    NotificationRead(NotificationKey),
    NotificationDismissed(NotificationKey),
    MarkAllRead,
    Teardown,
}

/// Callback trait for page observers
///
/// All methods have default no-op implementations.
#[async_trait]
pub trait PageCallbacks: Send + Sync {
    /// Called when a fetch replaced the entity list
    async fn on_entities_updated(&self, _entities: &[Entity]) {}

    /// Called after every overlay render
    async fn on_markers_rendered(&self, _markers: &[MarkerDescriptor]) {}

    /// Called when a fetch failed (the list is now empty)
    async fn on_fetch_error(&self, _error: &str) {}

    async fn on_geolocation_error(&self, _error: GeolocationError) {}

    async fn on_connection_state(&self, _state: ConnectionState) {}

    async fn on_notification(&self, _notification: &NotificationEvent) {}

    async fn on_selection_changed(&self, _selected: Option<&Entity>, _panel: Panel) {}
}

/// Default logging-only callbacks
pub struct LoggingCallbacks;

#[async_trait]
impl PageCallbacks for LoggingCallbacks {
    async fn on_entities_updated(&self, entities: &[Entity]) {
        tracing::info!(count = entities.len(), "Entities updated");
    }

    async fn on_markers_rendered(&self, markers: &[MarkerDescriptor]) {
        tracing::debug!(markers = markers.len(), "Markers rendered");
    }

    async fn on_fetch_error(&self, error: &str) {
        tracing::warn!(error, "Entity fetch failed");
    }

    async fn on_geolocation_error(&self, error: GeolocationError) {
        tracing::warn!(error = %error, "Geolocation failed");
    }

    async fn on_connection_state(&self, state: ConnectionState) {
        tracing::info!(?state, "Realtime connection state");
    }

    async fn on_notification(&self, notification: &NotificationEvent) {
        tracing::info!(
            id = %notification.id,
            source = ?notification.source,
            content = %notification.content,
            "Notification received"
        );
    }

    async fn on_selection_changed(&self, selected: Option<&Entity>, panel: Panel) {
        tracing::info!(
            selected = ?selected.map(|e| e.id.0),
            ?panel,
            "Selection changed"
        );
    }
}

/// Page settings derived from [`MapConfig`]
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub category: EntityCategory,
    pub center: Position,
    pub radius: SearchRadius,
    pub user_id: Option<i64>,
    pub reference_zoom: f64,
    pub quiet_period: Duration,
    pub animation_steps: u32,
    pub animation_frame: Duration,
    pub reveal_delay: Duration,
    pub toast_duration: Duration,
    pub notification_capacity: usize,
    pub map_api_key: Option<String>,
}

impl PageSettings {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            category: config.category(),
            center: config.center,
            radius: config.radius,
            user_id: config.user_id,
            reference_zoom: config.reference_zoom,
            quiet_period: config.quiet_period(),
            animation_steps: config.animation_steps,
            animation_frame: config.animation_frame(),
            reveal_delay: config.reveal_delay(),
            toast_duration: config.toast_duration(),
            notification_capacity: config.notification_capacity,
            map_api_key: config.map_api_key().map(str::to_string),
        }
    }
}

impl Default for PageSettings {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

/// Pending deadlines owned by the page; all dropped on teardown
#[derive(Debug, Default)]
struct Timers {
    animation: Option<Instant>,
    reveal: Option<(Instant, RevealTicket)>,
    toast: Option<(Instant, ToastTicket)>,
}

impl Timers {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// One map page and everything it owns
pub struct MapPage<L: MapLayer, C: PageCallbacks> {
    settings: PageSettings,
    client: Arc<dyn ApiClient>,
    geolocator: Arc<dyn Geolocator>,
    layer: L,
    callbacks: Arc<C>,

    position: PositionStore,
    debouncer: Debouncer<ViewportKey>,
    fired_rx: mpsc::UnboundedReceiver<Fired<ViewportKey>>,
    fetches: JoinSet<FetchOutcome>,
    cache: EntityCache,
    overlay: OverlayRenderer,
    selection: SelectionController,
    notifications: NotificationCenter,
    locating: JoinSet<Result<Position, GeolocationError>>,

    subscriber: Option<RealtimeSubscriber>,
    realtime: Option<RealtimeHandle>,
    realtime_tx: mpsc::UnboundedSender<RealtimeEvent>,
    realtime_rx: mpsc::UnboundedReceiver<RealtimeEvent>,
    connection_state: ConnectionState,

    timers: Timers,
}

/// Handle to a spawned page
pub struct PageHandle<L: MapLayer, C: PageCallbacks> {
    events: mpsc::UnboundedSender<PageEvent>,
    task: JoinHandle<MapPage<L, C>>,
}

impl<L: MapLayer + 'static, C: PageCallbacks + 'static> PageHandle<L, C> {
    /// Queue an event. Returns false once the page has stopped.
    pub fn send(&self, event: PageEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Tear the page down and get it back for inspection
    pub async fn teardown(self) -> Result<MapPage<L, C>, JoinError> {
        let _ = self.events.send(PageEvent::Teardown);
        self.task.await
    }
}

impl<L: MapLayer + 'static, C: PageCallbacks + 'static> MapPage<L, C> {
    pub fn new(
        settings: PageSettings,
        client: Arc<dyn ApiClient>,
        geolocator: Arc<dyn Geolocator>,
        layer: L,
        callbacks: C,
    ) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();

        Self {
            position: PositionStore::new(
                settings.center,
                settings.radius,
                settings.animation_steps,
            ),
            debouncer: Debouncer::new(settings.quiet_period, fired_tx),
            fired_rx,
            fetches: JoinSet::new(),
            cache: EntityCache::new(),
            overlay: OverlayRenderer::new(settings.reference_zoom),
            selection: SelectionController::new(),
            notifications: NotificationCenter::new(settings.notification_capacity),
            locating: JoinSet::new(),
            subscriber: None,
            realtime: None,
            realtime_tx,
            realtime_rx,
            connection_state: ConnectionState::Disconnected,
            timers: Timers::default(),
            settings,
            client,
            geolocator,
            layer,
            callbacks: Arc::new(callbacks),
        }
    }

    /// Attach a realtime subscriber, started on mount
    pub fn with_realtime(mut self, subscriber: RealtimeSubscriber) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    pub fn position(&self) -> &PositionStore {
        &self.position
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn callbacks(&self) -> Arc<C> {
        self.callbacks.clone()
    }

    /// Run the page on its own task
    pub fn spawn(self) -> PageHandle<L, C> {
        let (events, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        PageHandle { events, task }
    }

    /// Mount, process events until `Teardown` (or the sender is dropped),
    /// then tear down and return the page
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PageEvent>) -> Self {
        self.mount();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(PageEvent::Teardown) | None => break,
                    Some(event) => self.handle_event(event).await,
                },
                Some(fired) = self.fired_rx.recv() => self.start_fetch(fired),
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => match joined {
                    Ok(outcome) => self.apply_fetch(outcome).await,
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::error!(error = %e, "Fetch task failed"),
                },
                Some(located) = self.locating.join_next(), if !self.locating.is_empty() => match located {
                    Ok(result) => self.apply_location(result).await,
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::error!(error = %e, "Geolocation task failed"),
                },
                Some(event) = self.realtime_rx.recv() => self.handle_realtime(event).await,
                _ = sleep_until_opt(self.timers.animation) => self.tick_animation().await,
                _ = sleep_until_opt(self.timers.reveal.map(|(at, _)| at)) => {
                    if let Some((_, ticket)) = self.timers.reveal.take() {
                        self.selection.reveal(ticket);
                    }
                }
                _ = sleep_until_opt(self.timers.toast.map(|(at, _)| at)) => {
                    if let Some((_, ticket)) = self.timers.toast.take() {
                        self.notifications.expire_toast(ticket);
                    }
                }
            }
        }

        self.teardown().await;
        self
    }

    /// Draw center + circle, fetch immediately and start the realtime channel
    fn mount(&mut self) {
        let key = self.position.key();
        tracing::info!(
            category = %self.settings.category,
            center = %key.center,
            radius = %key.radius,
            "Mounting map page"
        );

        if let Some(provider_key) = &self.settings.map_api_key {
            self.layer.set_provider_key(provider_key);
        }
        self.layer.set_center_marker(key.center);
        self.layer
            .set_search_circle(key.center, self.position.displayed_km());
        self.debouncer.submit(key, FetchMode::Immediate);

        if let Some(subscriber) = self.subscriber.take() {
            let handle = subscriber.start(
                Some(self.subscription_key(key)),
                self.realtime_tx.clone(),
            );
            self.realtime = Some(handle);
        }
    }

    fn subscription_key(&self, key: ViewportKey) -> SubscriptionKey {
        SubscriptionKey {
            center: key.center,
            radius: key.radius,
            user_id: self.settings.user_id,
        }
    }

    async fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Drag(center) => {
                if self.position.set_center(center) {
                    self.layer.set_center_marker(center);
                    self.layer
                        .set_search_circle(center, self.position.displayed_km());
                    self.debouncer
                        .submit(self.position.key(), FetchMode::Debounced);
                }
            }

            PageEvent::Zoom(level) => {
                let scale = self.overlay.set_zoom(&mut self.layer, level);
                tracing::debug!(level, scale, "Zoom changed");
            }

            PageEvent::RequestRadius(radius) => {
                if self.position.request_radius(radius) == RadiusRequest::Animating {
                    self.timers.animation = Some(Instant::now() + self.settings.animation_frame);
                }
            }

            PageEvent::Locate => {
                let geolocator = self.geolocator.clone();
                self.locating
                    .spawn(async move { geolocator.current_position().await });
            }

            PageEvent::MarkerClicked(id) => {
                let entity = self.overlay.click(self.cache.entities(), id).cloned();
                match entity {
                    Some(entity) => {
                        let ticket = self.selection.select(entity);
                        self.timers.reveal =
                            Some((Instant::now() + self.settings.reveal_delay, ticket));
                        self.selection_changed().await;
                    }
                    None => tracing::debug!(entity_id = %id, "Click on unknown marker ignored"),
                }
            }

            PageEvent::MarkerImageFailed(id) => {
                self.overlay.handle_image_error(&mut self.layer, id);
            }

            PageEvent::OpenList => {
                self.selection.open_list();
                self.selection_changed().await;
            }

            PageEvent::OpenGuide => {
                self.selection.open_guide();
                self.selection_changed().await;
            }

            PageEvent::ClosePanel => {
                self.selection.close();
                self.selection_changed().await;
            }

            PageEvent::NotificationRead(key) => {
                self.notifications.mark_read(&key);
            }

            PageEvent::NotificationDismissed(key) => {
                self.notifications.dismiss(&key);
            }

            PageEvent::MarkAllRead => {
                self.notifications.mark_all_read();
            }

            // handled by the run loop
            PageEvent::Teardown => {}
        }
    }

    /// A call survived its quiet period: fetch and re-key the subscription
    fn start_fetch(&mut self, fired: Fired<ViewportKey>) {
        // A newer submit may have been handled while this one sat in the channel
        if !self.debouncer.is_current(fired.ticket) {
            tracing::debug!(ticket = fired.ticket.value(), "Skipping superseded fetch");
            return;
        }
        tracing::debug!(
            ticket = fired.ticket.value(),
            center = %fired.args.center,
            radius = %fired.args.radius,
            "Fetching entities"
        );
        self.fetches.spawn(fetch_entities(
            self.client.clone(),
            self.settings.category,
            fired.ticket,
            fired.args,
        ));

        if let Some(realtime) = &self.realtime {
            realtime.update_key(self.subscription_key(fired.args));
        }
    }

    async fn apply_fetch(&mut self, outcome: FetchOutcome) {
        match self.cache.apply(outcome, self.debouncer.gate()) {
            CacheUpdate::Replaced(_) => {
                self.callbacks
                    .on_entities_updated(self.cache.entities())
                    .await;
                self.render().await;
            }
            CacheUpdate::Failed(error) => {
                self.callbacks.on_fetch_error(&error).await;
                self.render().await;
            }
            CacheUpdate::Stale => {}
        }
    }

    async fn apply_location(&mut self, result: Result<Position, GeolocationError>) {
        match result {
            Ok(position) => {
                self.position.apply_location(Ok(position));
                self.layer.set_center_marker(position);
                self.layer
                    .set_search_circle(position, self.position.displayed_km());
                self.debouncer
                    .submit(self.position.key(), FetchMode::Immediate);
            }
            Err(e) => {
                self.position.apply_location(Err(e));
                self.callbacks.on_geolocation_error(e).await;
            }
        }
    }

    async fn tick_animation(&mut self) {
        self.timers.animation = None;
        let Some(frame) = self.position.tick_animation() else {
            return;
        };

        self.layer
            .set_search_circle(self.position.center(), frame.displayed_km);

        match frame.committed {
            Some(radius) => {
                tracing::debug!(radius = %radius, "Radius committed");
                self.render().await;
                self.debouncer
                    .submit(self.position.key(), FetchMode::Debounced);
            }
            None => {
                self.timers.animation = Some(Instant::now() + self.settings.animation_frame);
            }
        }
    }

    async fn handle_realtime(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::State(state) => {
                self.connection_state = state;
                self.callbacks.on_connection_state(state).await;
            }
            RealtimeEvent::Notification(notification) => {
                self.callbacks.on_notification(&notification).await;
                let ticket = self.notifications.push(notification);
                self.timers.toast = Some((Instant::now() + self.settings.toast_duration, ticket));
            }
            // already logged by the subscriber; the list is left untouched
            RealtimeEvent::Malformed { .. } => {}
        }
    }

    async fn selection_changed(&mut self) {
        self.callbacks
            .on_selection_changed(self.selection.selected(), self.selection.panel())
            .await;
        self.render().await;
    }

    async fn render(&mut self) {
        let markers = self.overlay.render(
            &mut self.layer,
            self.cache.entities(),
            self.selection.selected_id(),
            self.position.radius(),
        );
        self.callbacks.on_markers_rendered(&markers).await;
    }

    /// Cancel pending work, stop the realtime channel and clear the map
    async fn teardown(&mut self) {
        self.debouncer.cancel();
        self.fetches.abort_all();
        self.locating.abort_all();
        self.timers.clear();
        self.position.cancel_animation();
        self.notifications.clear_toast();

        if let Some(realtime) = self.realtime.take() {
            realtime.shutdown().await;
        }

        self.overlay.remove_all(&mut self.layer);
        self.layer.clear_search_circle();
        self.layer.clear_center_marker();
        tracing::info!("Map page torn down");
    }
}
