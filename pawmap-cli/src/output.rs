use crate::cli::OutputFormat;
use crate::error::CliResult;
use comfy_table::{ContentArrangement, Table};
use pawmap_api::{Entity, EntityDetail};
use pawmap_sync::NotificationEvent;

/// Format entities for display.
pub fn format_entities(entities: &[Entity], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(entities)?),
        OutputFormat::Table => Ok(entity_table(entities)),
    }
}

fn entity_table(entities: &[Entity]) -> String {
    if entities.is_empty() {
        return "(no entities)".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "STATUS", "NAME", "DETAIL", "LAT", "LNG", "KM"]);

    for entity in entities {
        table.add_row(vec![
            entity.id.to_string(),
            entity.status.to_string(),
            entity.fallback_label(),
            detail_summary(&entity.detail),
            format!("{:.5}", entity.position.latitude()),
            format!("{:.5}", entity.position.longitude()),
            entity
                .distance_km
                .map(|d| format!("{d:.2}"))
                .unwrap_or_default(),
        ]);
    }

    table.to_string()
}

fn detail_summary(detail: &EntityDetail) -> String {
    match detail {
        EntityDetail::Pet {
            age,
            gender,
            description,
            ..
        } => [age.as_deref(), gender.as_deref(), description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / "),
        EntityDetail::Facility {
            address,
            opening_hours,
            ..
        } => [address.as_deref(), opening_hours.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / "),
        EntityDetail::ShelterAnimal {
            address,
            animal_counts,
            ..
        } => format!(
            "{} (dogs {}, cats {}, others {})",
            address.as_deref().unwrap_or("-"),
            animal_counts.dogs,
            animal_counts.cats,
            animal_counts.others
        ),
    }
}

/// Notifications, most recent first.
pub fn notification_table<'a>(notifications: impl Iterator<Item = &'a NotificationEvent>) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "ID", "SOURCE", "STATUS", "RECEIVED", "CONTENT"]);

    let mut rows = 0;
    for n in notifications {
        rows += 1;
        table.add_row(vec![
            if n.read { " " } else { "*" }.to_string(),
            n.id.clone(),
            format!("{:?}", n.source).to_lowercase(),
            n.status.map(|s| s.to_string()).unwrap_or_default(),
            n.received_at.format("%H:%M:%S").to_string(),
            n.content.clone(),
        ]);
    }

    if rows == 0 {
        return "(no notifications)".to_string();
    }
    table.to_string()
}
