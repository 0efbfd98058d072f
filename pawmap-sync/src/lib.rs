//! Pawmap map page core
//!
//! A headless lost/found pet map page: keeps a center and search radius,
//! fetches nearby entities from the REST backend, draws them through a
//! [`MapLayer`] and keeps a STOMP subscription keyed to the viewport so
//! pushes land in a notification list.
//!
//! # Overview
//!
//! The page:
//! - Fetches entities immediately on mount and on "my location"
//! - Debounces drags and radius changes, discarding late responses
//! - Renders only entities inside the committed radius, scaled by zoom
//! - Re-keys the realtime subscription after each fetch, reconnecting with backoff
//! - Tears down every timer, task and marker on unmount
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clap::Parser;
//! use pawmap_sync::{
//!     LoggingCallbacks, MapConfig, MapPage, PageSettings, SceneLayer, UnsupportedGeolocator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MapConfig::parse();
//!     let (client, _token) = config.connect_api()?;
//!     let page = MapPage::new(
//!         PageSettings::from_config(&config),
//!         Arc::new(client),
//!         Arc::new(UnsupportedGeolocator),
//!         SceneLayer::new(),
//!         LoggingCallbacks,
//!     );
//!     let handle = page.spawn();
//!     tokio::signal::ctrl_c().await?;
//!     handle.teardown().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod notifications;
pub mod overlay;
pub mod position;
pub mod realtime;
pub mod runtime;
pub mod selection;
pub mod telemetry;

// Re-export main types
pub use cache::{BrowseStep, CacheUpdate, EntityCache, FetchOutcome, PagedBrowser};
pub use config::{MapConfig, PageKind};
pub use debounce::{Debouncer, FetchMode, SequenceGate, Ticket};
pub use error::{GeolocationError, PayloadError, RealtimeError, SyncError};
pub use notifications::{NotificationCenter, NotificationEvent, NotificationKey, PushSource};
pub use overlay::{
    zoom_scale, MapLayer, MarkerAction, MarkerDescriptor, MarkerHandle, OverlayRenderer,
    SceneLayer,
};
pub use position::{FixedGeolocator, Geolocator, PositionStore, UnsupportedGeolocator, ViewportKey};
pub use realtime::{
    ConnectionState, RealtimeEvent, RealtimeHandle, RealtimeSettings, RealtimeSubscriber,
    SubscriptionKey, WebSocketConnector,
};
pub use runtime::{LoggingCallbacks, MapPage, PageCallbacks, PageEvent, PageHandle, PageSettings};
pub use selection::{Panel, SelectionController};
pub use telemetry::{init_logging, LogFormat, TelemetryConfig};
