//! Local mirror of the Strava account
//!
//! A single SQLite file holds three tables:
//!
//! ```text
//! raw_activity_summary   # list-endpoint JSON, one row per activity, with checksum
//! raw_activity_details   # detail-endpoint JSON, one row per activity, with checksum
//! activity               # normalized columns used by the db commands
//! ```
//!
//! Every table keeps `created_at`/`updated_at`; `updated_at` is maintained by
//! triggers that can be switched off per connection, see
//! [`MirrorDb::set_updated_at_triggers_enabled`].

mod mirror_db;

pub use mirror_db::{checksum_for, ActivityRow, ActivityWrite, CountFilter, MirrorDb, RawRow, UpsertOutcome};
