//! SQLite store for the Strava mirror
//!
//! Raw payloads are stored next to a SHA-256 checksum of their JSON encoding,
//! so a re-export only touches the rows whose payload actually changed.

use std::path::Path;

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, SportError};
use crate::models::strava::{Gear, StravaActivity};

const SUMMARY_TABLE: &str = "raw_activity_summary";
const DETAILS_TABLE: &str = "raw_activity_details";

const TRIGGERS_FUNCTION: &str = "are_updated_at_triggers_enabled";

const ACTIVITY_COLUMNS: &str = "strava_id, name, distance, moving_time, elapsed_time, \
     total_elevation_gain, type, sport_type, start_date, start_date_local_str, timezone, \
     utc_offset, gear_id, heartrate_avg, heartrate_max, description, gear_name, gear_distance";

/// Hex SHA-256 of the JSON encoding of `data`.
///
/// `serde_json` keeps object keys sorted, so two payloads with the same
/// content always hash the same.
pub fn checksum_for(data: &Value) -> String {
    let encoded = data.to_string();
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

/// What an upsert did to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// One row of `raw_activity_summary` or `raw_activity_details`
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub id: i64,
    pub strava_id: u64,
    pub raw: Value,
    pub checksum: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalized activity, one row of the `activity` table
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub strava_id: u64,
    pub name: String,
    /// Meters
    pub distance: f64,
    /// Seconds
    pub moving_time: i64,
    /// Seconds
    pub elapsed_time: i64,
    pub total_elevation_gain: f64,
    pub activity_type: String,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    /// Strava's `start_date_local`, kept verbatim
    pub start_date_local_str: String,
    pub timezone: String,
    /// Seconds east of UTC
    pub utc_offset: f64,
    pub gear_id: Option<String>,
    pub heartrate_avg: Option<f64>,
    pub heartrate_max: Option<f64>,
    pub description: Option<String>,
    pub gear_name: Option<String>,
    /// Meters
    pub gear_distance: Option<f64>,
}

impl ActivityRow {
    /// Start date in the activity's own UTC offset
    pub fn local_start_date(&self) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.utc_offset as i32).unwrap_or(Utc.fix());
        self.start_date.with_timezone(&offset)
    }

    pub fn url(&self) -> String {
        format!("https://www.strava.com/activities/{}", self.strava_id)
    }
}

/// An activity row plus which detail-only columns the payload carried.
///
/// A summary payload has no `description` or `gear` key, and storing it must
/// not wipe the values a previous details export wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityWrite {
    pub row: ActivityRow,
    pub has_description: bool,
    pub has_gear: bool,
}

/// The subset of an activity payload the `activity` table needs
#[derive(Debug, Deserialize)]
struct ActivityPayload {
    #[serde(flatten)]
    activity: StravaActivity,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    gear: Option<Gear>,
}

fn is_truthy(value: Option<f64>) -> bool {
    value.is_some_and(|v| v != 0.0)
}

fn required<T>(value: Option<T>, field: &str, activity_id: u64) -> Result<T> {
    value.ok_or_else(|| {
        SportError::invalid_response(format!("Activity {} has no {}", activity_id, field))
    })
}

impl ActivityWrite {
    /// Build the `activity` row from a summary or details payload.
    ///
    /// The heart-rate attributes must all be set or all be unset, and an
    /// embedded `gear` object must agree with `gear_id`.
    pub fn from_strava_json(data: &Value) -> Result<Self> {
        let payload = ActivityPayload::deserialize(data)?;
        let activity = payload.activity;
        let id = activity.id;

        let hr_flags = [
            activity.has_heartrate.unwrap_or(false),
            is_truthy(activity.average_heartrate),
            is_truthy(activity.max_heartrate),
        ];
        if hr_flags.iter().any(|f| *f) && !hr_flags.iter().all(|f| *f) {
            return Err(SportError::HeartRateMismatch {
                activity_id: id,
                detail: format!(
                    "has_heartrate={:?}, average_heartrate={:?}, max_heartrate={:?}",
                    activity.has_heartrate, activity.average_heartrate, activity.max_heartrate
                ),
            });
        }

        let has_gear = data.get("gear").is_some();
        if let Some(gear) = &payload.gear {
            if activity.gear_id.as_deref() != Some(gear.id.as_str()) {
                return Err(SportError::GearIdMismatch {
                    activity_id: id,
                    gear_id: Some(gear.id.clone()),
                    expected: activity.gear_id.clone(),
                });
            }
        }

        let start_date = activity.start_date_utc()?;
        let (heartrate_avg, heartrate_max) = if is_truthy(activity.average_heartrate) {
            (activity.average_heartrate, activity.max_heartrate)
        } else {
            (None, None)
        };

        let row = ActivityRow {
            strava_id: id,
            name: activity.name,
            distance: required(activity.distance, "distance", id)?,
            moving_time: required(activity.moving_time, "moving_time", id)?,
            elapsed_time: required(activity.elapsed_time, "elapsed_time", id)?,
            total_elevation_gain: required(
                activity.total_elevation_gain,
                "total_elevation_gain",
                id,
            )?,
            activity_type: required(activity.activity_type, "type", id)?,
            sport_type: required(activity.sport_type, "sport_type", id)?,
            start_date,
            start_date_local_str: required(activity.start_date_local, "start_date_local", id)?,
            timezone: required(activity.timezone, "timezone", id)?,
            utc_offset: required(activity.utc_offset, "utc_offset", id)?,
            gear_id: activity.gear_id,
            heartrate_avg,
            heartrate_max,
            description: payload.description,
            gear_name: payload.gear.as_ref().and_then(|g| g.name.clone()),
            gear_distance: payload.gear.as_ref().and_then(|g| g.distance),
        };

        Ok(Self {
            row,
            has_description: data.get("description").is_some(),
            has_gear,
        })
    }
}

/// Filters for [`MirrorDb::count_activities`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountFilter {
    pub start_date_after: Option<DateTime<Utc>>,
    pub start_date_before: Option<DateTime<Utc>>,
    /// Compared case-insensitively with the `type` column
    pub activity_type: Option<String>,
}

fn format_utc(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn strava_id_of(data: &Value) -> Result<u64> {
    data.get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| SportError::invalid_response("Activity payload has no numeric id"))
}

fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
    let start_date: String = row.get(8)?;
    let start_date = DateTime::parse_from_rfc3339(&start_date)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(ActivityRow {
        strava_id: row.get::<_, i64>(0)? as u64,
        name: row.get(1)?,
        distance: row.get(2)?,
        moving_time: row.get(3)?,
        elapsed_time: row.get(4)?,
        total_elevation_gain: row.get(5)?,
        activity_type: row.get(6)?,
        sport_type: row.get(7)?,
        start_date,
        start_date_local_str: row.get(9)?,
        timezone: row.get(10)?,
        utc_offset: row.get(11)?,
        gear_id: row.get(12)?,
        heartrate_avg: row.get(13)?,
        heartrate_max: row.get(14)?,
        description: row.get(15)?,
        gear_name: row.get(16)?,
        gear_distance: row.get(17)?,
    })
}

/// SQLite database holding the Strava mirror
pub struct MirrorDb {
    conn: Connection,
}

impl MirrorDb {
    /// Open or create the mirror database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| SportError::Database(format!("Failed to open mirror database: {}", e)))?;

        let db = Self { conn };
        db.set_updated_at_triggers_enabled(true)?;
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SportError::Database(format!("Failed to open in-memory database: {}", e))
        })?;

        let db = Self { conn };
        db.set_updated_at_triggers_enabled(true)?;
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let mut sql = String::from(
            r#"
            CREATE TABLE IF NOT EXISTS raw_activity_summary (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')),
                raw TEXT NOT NULL,
                strava_id INTEGER NOT NULL UNIQUE,
                checksum TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS raw_activity_details (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')),
                raw TEXT NOT NULL,
                strava_id INTEGER NOT NULL UNIQUE,
                checksum TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')),
                strava_id INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                distance REAL NOT NULL,
                moving_time INTEGER NOT NULL,
                elapsed_time INTEGER NOT NULL,
                total_elevation_gain REAL NOT NULL,
                type TEXT NOT NULL,
                sport_type TEXT NOT NULL,
                start_date TEXT NOT NULL,
                start_date_local_str TEXT NOT NULL,
                timezone TEXT NOT NULL,
                utc_offset REAL NOT NULL,
                gear_id TEXT,
                heartrate_avg REAL,
                heartrate_max REAL,
                description TEXT,
                gear_name TEXT,
                gear_distance REAL
            );

            CREATE INDEX IF NOT EXISTS idx_activity_start_date ON activity(start_date);
            "#,
        );

        for table in [SUMMARY_TABLE, DETAILS_TABLE, "activity"] {
            sql.push_str(&format!(
                r#"
                CREATE TRIGGER IF NOT EXISTS {table}_updated_at
                AFTER UPDATE ON {table}
                FOR EACH ROW
                WHEN (SELECT {TRIGGERS_FUNCTION}()) = 1
                BEGIN
                    UPDATE {table} SET updated_at = STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')
                    WHERE id = NEW.id;
                END;
                "#
            ));
        }

        self.conn
            .execute_batch(&sql)
            .map_err(|e| SportError::Database(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }

    /// Switch the `updated_at` triggers on or off for this connection
    pub fn set_updated_at_triggers_enabled(&self, enabled: bool) -> Result<()> {
        let flag = i64::from(enabled);
        self.conn
            .create_scalar_function(TRIGGERS_FUNCTION, 0, FunctionFlags::SQLITE_UTF8, move |_| {
                Ok(flag)
            })
            .map_err(|e| SportError::Database(format!("Failed to register {}: {}", TRIGGERS_FUNCTION, e)))
    }

    // =========================================================================
    // Raw payloads
    // =========================================================================

    fn get_raw(&self, table: &str, strava_id: u64) -> Result<Option<RawRow>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, strava_id, raw, checksum, created_at, updated_at
                     FROM {} WHERE strava_id = ?",
                    table
                ),
                params![strava_id as i64],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| SportError::Database(format!("Failed to read {}: {}", table, e)))?;

        row.map(|(id, strava_id, raw, checksum, created_at, updated_at)| {
            Ok(RawRow {
                id,
                strava_id: strava_id as u64,
                raw: serde_json::from_str(&raw)?,
                checksum,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    fn upsert_raw(&self, table: &str, data: &Value) -> Result<UpsertOutcome> {
        let strava_id = strava_id_of(data)?;
        let checksum = checksum_for(data);

        let outcome = match self.get_raw(table, strava_id)? {
            None => UpsertOutcome::Created,
            Some(existing) if existing.checksum == checksum => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
        };

        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (raw, strava_id, checksum) VALUES (?1, ?2, ?3)
                     ON CONFLICT(strava_id) DO UPDATE SET
                        raw = excluded.raw,
                        checksum = excluded.checksum",
                    table
                ),
                params![data.to_string(), strava_id as i64, checksum],
            )
            .map_err(|e| SportError::Database(format!("Failed to write {}: {}", table, e)))?;

        debug!(strava_id, table, ?outcome, "Stored raw payload");
        Ok(outcome)
    }

    pub fn get_raw_summary(&self, strava_id: u64) -> Result<Option<RawRow>> {
        self.get_raw(SUMMARY_TABLE, strava_id)
    }

    pub fn get_raw_details(&self, strava_id: u64) -> Result<Option<RawRow>> {
        self.get_raw(DETAILS_TABLE, strava_id)
    }

    /// Store a list-endpoint payload; unchanged checksums are left alone
    pub fn upsert_raw_summary(&self, data: &Value) -> Result<UpsertOutcome> {
        self.upsert_raw(SUMMARY_TABLE, data)
    }

    /// Store a detail-endpoint payload; unchanged checksums are left alone
    pub fn upsert_raw_details(&self, data: &Value) -> Result<UpsertOutcome> {
        self.upsert_raw(DETAILS_TABLE, data)
    }

    /// Store a summary payload and refresh its `activity` row, atomically.
    /// The activity row is only rewritten when the raw payload changed.
    pub fn store_summary(&self, data: &Value) -> Result<UpsertOutcome> {
        self.store(SUMMARY_TABLE, data)
    }

    /// Same as [`store_summary`](Self::store_summary) for a details payload
    pub fn store_details(&self, data: &Value) -> Result<UpsertOutcome> {
        self.store(DETAILS_TABLE, data)
    }

    fn store(&self, table: &str, data: &Value) -> Result<UpsertOutcome> {
        let write = ActivityWrite::from_strava_json(data)?;
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| SportError::Database(format!("Failed to start transaction: {}", e)))?;

        let outcome = self.upsert_raw(table, data)?;
        if outcome != UpsertOutcome::Unchanged {
            self.upsert_activity(&write)?;
        }

        tx.commit()
            .map_err(|e| SportError::Database(format!("Failed to commit: {}", e)))?;
        Ok(outcome)
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Insert or update an activity by `strava_id`.
    ///
    /// `description` and the gear columns are only overwritten when the
    /// payload carried them.
    pub fn upsert_activity(&self, write: &ActivityWrite) -> Result<()> {
        let row = &write.row;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO activity ({ACTIVITY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                     ON CONFLICT(strava_id) DO UPDATE SET
                        name = excluded.name,
                        distance = excluded.distance,
                        moving_time = excluded.moving_time,
                        elapsed_time = excluded.elapsed_time,
                        total_elevation_gain = excluded.total_elevation_gain,
                        type = excluded.type,
                        sport_type = excluded.sport_type,
                        start_date = excluded.start_date,
                        start_date_local_str = excluded.start_date_local_str,
                        timezone = excluded.timezone,
                        utc_offset = excluded.utc_offset,
                        gear_id = excluded.gear_id,
                        heartrate_avg = excluded.heartrate_avg,
                        heartrate_max = excluded.heartrate_max,
                        description = CASE WHEN ?19 THEN excluded.description ELSE activity.description END,
                        gear_name = CASE WHEN ?20 THEN excluded.gear_name ELSE activity.gear_name END,
                        gear_distance = CASE WHEN ?20 THEN excluded.gear_distance ELSE activity.gear_distance END"
                ),
                params![
                    row.strava_id as i64,
                    row.name,
                    row.distance,
                    row.moving_time,
                    row.elapsed_time,
                    row.total_elevation_gain,
                    row.activity_type,
                    row.sport_type,
                    format_utc(row.start_date),
                    row.start_date_local_str,
                    row.timezone,
                    row.utc_offset,
                    row.gear_id,
                    row.heartrate_avg,
                    row.heartrate_max,
                    row.description,
                    row.gear_name,
                    row.gear_distance,
                    write.has_description,
                    write.has_gear,
                ],
            )
            .map_err(|e| SportError::Database(format!("Failed to write activity: {}", e)))?;

        Ok(())
    }

    pub fn get_activity(&self, strava_id: u64) -> Result<Option<ActivityRow>> {
        self.conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activity WHERE strava_id = ?"),
                params![strava_id as i64],
                row_to_activity,
            )
            .optional()
            .map_err(|e| SportError::Database(format!("Failed to read activity: {}", e)))
    }

    /// Strava ids of the activities started within `[after, before]`, oldest
    /// first. With `missing_details_only`, activities that already have a
    /// details payload are left out.
    pub fn activity_ids_in_range(
        &self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        missing_details_only: bool,
    ) -> Result<Vec<u64>> {
        let mut sql = String::from("SELECT strava_id FROM activity WHERE 1 = 1");
        let mut values = Vec::new();
        if let Some(after) = after {
            sql.push_str(" AND start_date >= ?");
            values.push(format_utc(after));
        }
        if let Some(before) = before {
            sql.push_str(" AND start_date <= ?");
            values.push(format_utc(before));
        }
        if missing_details_only {
            sql.push_str(" AND strava_id NOT IN (SELECT strava_id FROM raw_activity_details)");
        }
        sql.push_str(" ORDER BY start_date");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| SportError::Database(format!("Failed to prepare query: {}", e)))?;

        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))
            .map_err(|e| SportError::Database(format!("Failed to query activities: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SportError::Database(format!("Failed to read activity: {}", e)))?;

        Ok(ids.into_iter().map(|id| id as u64).collect())
    }

    pub fn count_activities(&self, filter: &CountFilter) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM activity WHERE 1 = 1");
        let mut values = Vec::new();
        if let Some(after) = filter.start_date_after {
            sql.push_str(" AND start_date >= ?");
            values.push(format_utc(after));
        }
        if let Some(before) = filter.start_date_before {
            sql.push_str(" AND start_date <= ?");
            values.push(format_utc(before));
        }
        if let Some(activity_type) = &filter.activity_type {
            sql.push_str(" AND type = ? COLLATE NOCASE");
            values.push(activity_type.clone());
        }

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .map_err(|e| SportError::Database(format!("Failed to count activities: {}", e)))?;

        Ok(count as u64)
    }

    pub fn total_activities(&self) -> Result<u64> {
        self.count_activities(&CountFilter::default())
    }

    /// Every stored activity, oldest first
    pub fn all_activities(&self) -> Result<Vec<ActivityRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activity ORDER BY start_date"
            ))
            .map_err(|e| SportError::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], row_to_activity)
            .map_err(|e| SportError::Database(format!("Failed to query activities: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SportError::Database(format!("Failed to read activity: {}", e)))?;

        Ok(rows)
    }

    /// Activities whose name or description contains `text`, ignoring case
    pub fn search_text(&self, text: &str) -> Result<Vec<ActivityRow>> {
        let needle = text.to_lowercase();
        Ok(self
            .all_activities()?
            .into_iter()
            .filter(|a| {
                a.name.to_lowercase().contains(&needle)
                    || a
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }
}
