use colored::Colorize;
use pawmap_api::{ApiClient, ApplicationAction, ApplyTarget, EntityId};

use crate::cli::{ApplicationCommand, ApplyKind};
use crate::context::CommandContext;
use crate::error::CliResult;

pub fn to_action(command: ApplicationCommand) -> ApplicationAction {
    match command {
        ApplicationCommand::Accept { protection_id } => ApplicationAction::Accept { protection_id },
        ApplicationCommand::Reject { protection_id } => ApplicationAction::Reject { protection_id },
        ApplicationCommand::Cancel { protection_id } => ApplicationAction::Cancel { protection_id },
        ApplicationCommand::Apply {
            target,
            id,
            message,
        } => ApplicationAction::Apply {
            target: match target {
                ApplyKind::Pet => ApplyTarget::Pet(EntityId(id)),
                ApplyKind::Shelter => ApplyTarget::ShelterAnimal(EntityId(id)),
            },
            message,
        },
    }
}

pub async fn run(ctx: &CommandContext, command: ApplicationCommand) -> CliResult<()> {
    ctx.require_token()?;

    let action = to_action(command);
    let ack = ctx.client.apply_action(&action).await?;

    let message = ack
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "done".to_string());
    println!("{} {message}", "ok:".green().bold());
    Ok(())
}
