//! Map page configuration and validation
//!
//! Endpoints, initial viewport, timing knobs for debounce, animation and
//! reveal delays, and reconnect behavior. Endpoint and map provider key
//! defaults are baked in at build time from `PAWMAP_API_BASE_URL`,
//! `PAWMAP_WS_URL` and `PAWMAP_MAP_API_KEY`, and can be overridden by the
//! same variables at runtime or by flags.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use pawmap_api::{EntityCategory, HttpApiClient, Position, SearchRadius};

use crate::error::{Result, SyncError};

const DEFAULT_API_BASE_URL: &str = match option_env!("PAWMAP_API_BASE_URL") {
    Some(url) => url,
    None => "http://localhost:8080",
};

const DEFAULT_WS_URL: &str = match option_env!("PAWMAP_WS_URL") {
    Some(url) => url,
    None => "ws://localhost:8080/ws",
};

const DEFAULT_MAP_API_KEY: Option<&str> = option_env!("PAWMAP_MAP_API_KEY");

/// Seoul City Hall
const DEFAULT_CENTER: &str = "37.5665,126.9780";

/// Which map page to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PageKind {
    /// Lost / found pets
    #[default]
    Pets,
    /// Hospitals, pet shops and other facilities
    Facilities,
    /// Shelter animals
    Shelters,
}

impl From<PageKind> for EntityCategory {
    fn from(kind: PageKind) -> Self {
        match kind {
            PageKind::Pets => EntityCategory::Pets,
            PageKind::Facilities => EntityCategory::Facilities,
            PageKind::Shelters => EntityCategory::Shelters,
        }
    }
}

// Configuration for one map page.
// Flattened into the CLI: keep command-level attributes off this struct.
#[derive(Parser, Debug, Clone)]
pub struct MapConfig {
    // === Endpoints ===
    /// Backend REST base URL
    #[arg(long, env = "PAWMAP_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// STOMP-over-WebSocket endpoint
    #[arg(long, env = "PAWMAP_WS_URL", default_value = DEFAULT_WS_URL)]
    pub ws_url: String,

    /// Map provider key, handed to the map layer on mount
    #[arg(long, env = "PAWMAP_MAP_API_KEY", hide_env_values = true)]
    pub map_api_key: Option<String>,

    /// Bearer token (or @filepath to read from file)
    #[arg(long, env = "PAWMAP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User id sent with realtime subscriptions
    #[arg(long, env = "PAWMAP_USER_ID")]
    pub user_id: Option<i64>,

    // === Viewport ===
    #[arg(long, value_enum, default_value = "pets")]
    pub page: PageKind,

    /// Initial center as <lat>,<lng>
    #[arg(long, default_value = DEFAULT_CENTER)]
    pub center: Position,

    /// Initial search radius in km (1-10)
    #[arg(long, default_value = "3")]
    pub radius: SearchRadius,

    /// Also receive pushes for the user's own posts
    #[arg(long)]
    pub include_own_posts: bool,

    /// Zoom level at which markers are drawn at scale 1.0
    #[arg(long, default_value = "3.0")]
    pub reference_zoom: f64,

    // === Timing ===
    /// Quiet period before a drag-triggered fetch (ms)
    #[arg(long, default_value = "500")]
    pub quiet_period_ms: u64,

    /// Interpolation steps of the search circle animation
    #[arg(long, default_value = "10")]
    pub animation_steps: u32,

    /// Delay between animation steps (ms)
    #[arg(long, default_value = "16")]
    pub animation_frame_ms: u64,

    /// Delay before the selection card is revealed (ms)
    #[arg(long, default_value = "50")]
    pub reveal_delay_ms: u64,

    /// How long a notification toast stays up (ms)
    #[arg(long, default_value = "3000")]
    pub toast_ms: u64,

    /// Maximum notifications kept in memory
    #[arg(long, default_value = "100")]
    pub notification_capacity: usize,

    // === Reconnect behavior ===
    /// Initial reconnect delay (ms)
    #[arg(long, default_value = "5000")]
    pub reconnect_initial_ms: u64,

    /// Max reconnect delay (ms)
    #[arg(long, default_value = "30000")]
    pub reconnect_max_ms: u64,

    /// Reconnect backoff multiplier
    #[arg(long, default_value = "2.0")]
    pub reconnect_multiplier: f64,

    /// Connect + STOMP handshake timeout (ms)
    #[arg(long, default_value = "10000")]
    pub connect_timeout_ms: u64,
}

impl MapConfig {
    /// Validate the configuration at startup
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            ));
        }
        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(format!("ws_url must be a ws(s) URL, got '{}'", self.ws_url));
        }

        if self.quiet_period_ms == 0 {
            return Err("quiet_period_ms must be > 0".to_string());
        }
        if self.animation_steps == 0 {
            return Err("animation_steps must be > 0".to_string());
        }
        if !(self.reference_zoom.is_finite() && self.reference_zoom > 0.0) {
            return Err("reference_zoom must be > 0".to_string());
        }
        if self.notification_capacity == 0 {
            return Err("notification_capacity must be > 0".to_string());
        }

        // Validate reconnect parameters
        if self.reconnect_initial_ms == 0 {
            return Err("reconnect_initial_ms must be > 0".to_string());
        }
        if self.reconnect_max_ms < self.reconnect_initial_ms {
            return Err("reconnect_max_ms must be >= reconnect_initial_ms".to_string());
        }
        if self.reconnect_multiplier < 1.0 {
            return Err("reconnect_multiplier must be >= 1.0".to_string());
        }

        Ok(())
    }

    /// Flag or runtime env first, then the key baked in at build time
    pub fn map_api_key(&self) -> Option<&str> {
        self.map_api_key.as_deref().or(DEFAULT_MAP_API_KEY)
    }

    pub fn category(&self) -> EntityCategory {
        self.page.into()
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn animation_frame(&self) -> Duration {
        Duration::from_millis(self.animation_frame_ms)
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    /// Host header for the STOMP CONNECT frame
    pub fn broker_host(&self) -> String {
        let rest = self
            .ws_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.ws_url);
        let authority = rest.split('/').next().unwrap_or(rest);
        authority
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(authority)
            .to_string()
    }

    /// Validate, resolve the token and build the REST client
    pub fn connect_api(&self) -> Result<(HttpApiClient, Option<String>)> {
        self.validate().map_err(SyncError::Config)?;
        let token = self.load_token()?;
        let client = HttpApiClient::new(&self.api_base_url, token.clone())?;
        Ok((client, token))
    }

    /// Load the Bearer token, resolving @filepath if needed
    pub fn load_token(&self) -> std::result::Result<Option<String>, std::io::Error> {
        match &self.token {
            Some(token) if token.starts_with('@') => {
                let path = shellexpand(&token[1..]);
                let content = std::fs::read_to_string(path)?;
                Ok(Some(content.trim().to_string()))
            }
            Some(token) => Ok(Some(token.clone())),
            None => Ok(None),
        }
    }
}

/// Expand a leading `~/` in paths
fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            map_api_key: None,
            token: None,
            user_id: None,
            page: PageKind::Pets,
            center: Position::default(),
            radius: SearchRadius::default(),
            include_own_posts: false,
            reference_zoom: 3.0,
            quiet_period_ms: 500,
            animation_steps: 10,
            animation_frame_ms: 16,
            reveal_delay_ms: 50,
            toast_ms: 3000,
            notification_capacity: 100,
            reconnect_initial_ms: 5000,
            reconnect_max_ms: 30000,
            reconnect_multiplier: 2.0,
            connect_timeout_ms: 10000,
        }
    }
}
