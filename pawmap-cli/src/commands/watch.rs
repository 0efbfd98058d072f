//! `pawmap watch`: a headless map page printing what a browser would draw

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use pawmap_api::Entity;
use pawmap_sync::{
    ConnectionState, MapPage, MarkerDescriptor, NotificationEvent, PageCallbacks, PageSettings,
    RealtimeSettings, RealtimeSubscriber, SceneLayer, UnsupportedGeolocator, WebSocketConnector,
};

use crate::context::CommandContext;
use crate::error::CliResult;
use crate::output;

/// Prints page activity to stdout
struct ConsoleCallbacks {
    quiet: bool,
}

#[async_trait]
impl PageCallbacks for ConsoleCallbacks {
    async fn on_markers_rendered(&self, markers: &[MarkerDescriptor]) {
        if self.quiet {
            return;
        }
        println!("{} {} marker(s)", "map:".blue().bold(), markers.len());
        for marker in markers {
            println!(
                "  #{:<8} {:<10} {:.5},{:.5}",
                marker.entity_id.to_string(),
                marker.status.to_string(),
                marker.position.latitude(),
                marker.position.longitude()
            );
        }
    }

    async fn on_entities_updated(&self, entities: &[Entity]) {
        tracing::debug!(count = entities.len(), "Entities updated");
    }

    async fn on_fetch_error(&self, error: &str) {
        eprintln!("{} {error}", "warning:".yellow().bold());
    }

    async fn on_connection_state(&self, state: ConnectionState) {
        if !self.quiet {
            println!("{} {state:?}", "realtime:".blue().bold());
        }
    }

    async fn on_notification(&self, notification: &NotificationEvent) {
        println!(
            "{} [{}] {}",
            "push:".magenta().bold(),
            notification.id,
            notification.content
        );
    }
}

pub async fn run(ctx: &CommandContext, duration: Option<Duration>, quiet: bool) -> CliResult<()> {
    let config = &ctx.config;
    tracing::info!(
        page = ?config.page,
        center = %config.center,
        radius = %config.radius,
        ws_url = %config.ws_url,
        map_key_configured = config.map_api_key().is_some(),
        "Starting map page"
    );

    let subscriber = RealtimeSubscriber::new(
        Arc::new(WebSocketConnector::new(config.ws_url.clone())),
        RealtimeSettings::from_config(config, ctx.token.clone()),
    );
    let handle = MapPage::new(
        PageSettings::from_config(config),
        ctx.client.clone(),
        Arc::new(UnsupportedGeolocator),
        SceneLayer::new(),
        ConsoleCallbacks { quiet },
    )
    .with_realtime(subscriber)
    .spawn();

    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => tokio::signal::ctrl_c().await?,
    }

    let page = handle.teardown().await?;
    if !quiet {
        println!();
        println!("Notifications ({} unread):", page.notifications().unread_count());
        println!("{}", output::notification_table(page.notifications().iter()));
    }
    Ok(())
}
