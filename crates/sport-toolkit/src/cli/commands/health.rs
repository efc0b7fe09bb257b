use chrono::Local;

use crate::error::Result;

/// Print the current local time, proof that the binary runs
pub fn health() -> Result<()> {
    println!("{}", Local::now().to_rfc3339());
    Ok(())
}
