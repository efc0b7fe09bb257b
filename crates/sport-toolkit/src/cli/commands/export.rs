//! Export the Strava account into the local mirror

use std::io::{self, BufRead, Write};

use chrono::Utc;

use crate::dates::parse_aware;
use crate::error::Result;
use crate::export::{is_yes, Exporter, InteractiveWait, Strategy};

use super::session::Context;

/// What to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Summaries,
    Details,
}

impl ExportKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Summaries => "summaries",
            Self::Details => "details",
        }
    }
}

/// Ask for a y/n confirmation on the terminal
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/n] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

/// Run one export pass
pub async fn run(
    ctx: &Context,
    kind: ExportKind,
    strategy: &str,
    before_ts: Option<String>,
    after_ts: Option<String>,
    assume_yes: bool,
) -> Result<()> {
    let strategy: Strategy = strategy.parse()?;
    let before = before_ts.as_deref().map(parse_aware).transpose()?;
    let after = after_ts.as_deref().map(parse_aware).transpose()?;

    if !assume_yes {
        let prompt = format!(
            "So you want to export: {}\n with strategy: {}\n and before_ts: {}\n and after_ts: {}\n Continue?",
            kind.as_str(),
            strategy,
            before.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
            after.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
        );
        if !confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
        if kind == ExportKind::Details {
            println!(
                "Mind that this command might hit Strava API rate limits, \
                 if so you will be asked whether to wait (max 15 mins)."
            );
        }
    }

    let db = ctx.mirror()?;
    let client = ctx.strava().await?;
    println!("Using database: {}", ctx.settings.db_path.display());

    let mut exporter = Exporter::new(&client, &db, strategy, InteractiveWait::new(assume_yes))
        .before(before.map(|d| d.with_timezone(&Utc)))
        .after(after.map(|d| d.with_timezone(&Utc)));

    let stats = match kind {
        ExportKind::Summaries => exporter.export_summaries().await?,
        ExportKind::Details => exporter.export_details().await?,
    };

    println!("\nExport complete: {}", stats);
    Ok(())
}
