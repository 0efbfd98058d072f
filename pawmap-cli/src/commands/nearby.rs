use std::cmp::Ordering;

use pawmap_api::ApiClient;

use crate::cli::OutputFormat;
use crate::context::CommandContext;
use crate::error::CliResult;
use crate::output;

pub async fn run(ctx: &CommandContext, format: OutputFormat) -> CliResult<()> {
    let config = &ctx.config;
    let center = config.center;
    let radius = config.radius;

    let mut entities: Vec<_> = ctx
        .client
        .fetch_map(config.category(), center, radius)
        .await?
        .into_iter()
        .map(|e| e.with_distance_from(&center))
        .filter(|e| e.distance_km.is_some_and(|d| radius.contains_km(d)))
        .collect();
    entities.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
    });

    println!("{}", output::format_entities(&entities, format)?);
    Ok(())
}
