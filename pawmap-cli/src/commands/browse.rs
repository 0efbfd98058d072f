use pawmap_sync::{BrowseStep, PagedBrowser};

use crate::cli::OutputFormat;
use crate::context::CommandContext;
use crate::error::{CliError, CliResult};
use crate::output;

pub async fn run(ctx: &CommandContext, size: u32, pages: u32, format: OutputFormat) -> CliResult<()> {
    if size == 0 {
        return Err(CliError::Usage("--size must be at least 1".to_string()));
    }

    let mut browser = PagedBrowser::new(ctx.config.category(), size);
    for _ in 0..pages {
        match browser.load_next(ctx.client.as_ref()).await {
            BrowseStep::Appended(_) => {}
            BrowseStep::Exhausted => break,
            BrowseStep::Failed(error) => {
                // keep what was loaded; report the failure only if nothing was
                if browser.items().is_empty() {
                    return Err(CliError::Input(error));
                }
                tracing::warn!(%error, loaded = browser.items().len(), "Stopped browsing early");
                break;
            }
        }
        if browser.is_exhausted() {
            break;
        }
    }

    println!("{}", output::format_entities(browser.items(), format)?);
    if !browser.is_exhausted() && format == OutputFormat::Table {
        println!("More available; next page is {}", browser.next_page());
    }
    Ok(())
}
