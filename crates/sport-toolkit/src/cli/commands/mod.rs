pub mod compare;
pub mod db;
pub mod export;
pub mod health;
pub mod search;
pub mod session;
pub mod streams;

pub use compare::compare_hr;
pub use db::{count as db_count, search_text as db_search_text};
pub use export::{run as export, ExportKind};
pub use health::health;
pub use search::{matching_garmin, matching_strava};
pub use session::Context;
pub use streams::{garmin as garmin_streams, strava as strava_streams};
