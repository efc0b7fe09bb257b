//! Queries over the local Strava mirror

use crate::analysis;
use crate::error::Result;

use super::session::Context;

/// Count mirrored activities
pub fn count(
    ctx: &Context,
    start_date_after: Option<String>,
    start_date_before: Option<String>,
    activity_type: Option<String>,
) -> Result<()> {
    let db = ctx.mirror()?;
    let count = analysis::count_activities_db(
        &db,
        start_date_after.as_deref(),
        start_date_before.as_deref(),
        activity_type.as_deref(),
    )?;
    let total = db.total_activities()?;

    println!("Filtered activities: {}", count);
    println!("Total activities:    {}", total);
    Ok(())
}

/// Search activity names and descriptions
pub fn search_text(ctx: &Context, text: &str) -> Result<()> {
    let db = ctx.mirror()?;
    let found = analysis::search_text_db(&db, text)?;

    if found.is_empty() {
        println!("No activities found.");
        return Ok(());
    }

    println!("{:<12} {:<25} {:<12} URL", "Date", "Name", "Type");
    println!("{}", "-".repeat(95));
    for activity in &found {
        println!(
            "{:<12} {:<25} {:<12} {}",
            activity.local_start_date().format("%Y-%m-%d"),
            truncate(&activity.name, 25),
            activity.activity_type,
            activity.url()
        );
    }
    println!("\nFound {} activities", found.len());
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Passo del Mortirolo", 10), "Passo d...");
        assert_eq!(truncate("Giro d'Italia à Città", 8), "Giro ...");
    }
}
