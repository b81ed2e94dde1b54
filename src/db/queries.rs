use crate::db::{Database, SnapshotStore};
use crate::error::{PlannerError, Result};
use crate::models::{Geometry, Zone, ZoneId};
use chrono::NaiveDate;
use rusqlite::{params, Row};
use tracing::warn;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

// Plan Snapshot Queries

impl SnapshotStore for Database {
    fn save_snapshot(&self, date: NaiveDate, zones: &[Zone]) -> Result<()> {
        let plan_date = date.format(DATE_FORMAT).to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // Zones cascade with the plan row
            tx.execute("DELETE FROM plans WHERE plan_date = ?1", [&plan_date])?;
            tx.execute("INSERT INTO plans (plan_date) VALUES (?1)", [&plan_date])?;

            for (position, zone) in zones.iter().enumerate() {
                let geometry = serde_json::to_string(&zone.geometry)?;
                tx.execute(
                    r#"
                    INSERT INTO zones
                        (id, plan_date, position, label, geometry, watering_enabled, rain_blocked)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        zone.id.to_string(),
                        plan_date,
                        position as i64,
                        zone.label,
                        geometry,
                        zone.watering_enabled,
                        zone.rain_blocked,
                    ],
                )?;
            }

            tx.commit()?;
            tracing::debug!(date = %plan_date, zones = zones.len(), "Saved plan snapshot");
            Ok(())
        })
    }

    fn load_snapshot(&self, date: NaiveDate) -> Result<Vec<Zone>> {
        let plan_date = date.format(DATE_FORMAT).to_string();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, label, geometry, watering_enabled, rain_blocked
                FROM zones WHERE plan_date = ?1 ORDER BY position
                "#,
            )?;
            let rows = stmt
                .query_map([&plan_date], row_to_stored_zone)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // One unreadable row fails the whole load; a partial plan saved
            // back would erase it.
            rows.into_iter()
                .map(|stored| stored.into_zone(&plan_date))
                .collect()
        })
    }
}

impl Database {
    /// Dates that have a saved snapshot, newest first
    pub fn list_plan_dates(&self) -> Result<Vec<NaiveDate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT plan_date FROM plans ORDER BY plan_date DESC")?;
            let dates = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .filter_map(|s| match NaiveDate::parse_from_str(&s, DATE_FORMAT) {
                    Ok(d) => Some(d),
                    Err(_) => {
                        warn!(plan_date = %s, "Unparseable plan_date in database, ignoring");
                        None
                    }
                })
                .collect();
            Ok(dates)
        })
    }
}

struct StoredZone {
    id: String,
    label: String,
    geometry: String,
    watering_enabled: bool,
    rain_blocked: bool,
}

fn row_to_stored_zone(row: &Row) -> rusqlite::Result<StoredZone> {
    Ok(StoredZone {
        id: row.get("id")?,
        label: row.get("label")?,
        geometry: row.get("geometry")?,
        watering_enabled: row.get("watering_enabled")?,
        rain_blocked: row.get("rain_blocked")?,
    })
}

impl StoredZone {
    fn into_zone(self, plan_date: &str) -> Result<Zone> {
        let corrupt = |what: &str, detail: String| {
            warn!(plan_date, zone_id = %self.id, %detail, "Unreadable zone row");
            PlannerError::InvalidData(format!(
                "zone {} on {} has {}: {}",
                self.id, plan_date, what, detail
            ))
        };

        let id = Uuid::parse_str(&self.id)
            .map(ZoneId)
            .map_err(|e| corrupt("an invalid id", e.to_string()))?;

        let geometry: Geometry = serde_json::from_str(&self.geometry)
            .map_err(|e| corrupt("unreadable geometry", e.to_string()))?;

        Zone::restore(
            id,
            self.label.clone(),
            geometry,
            self.rain_blocked,
            self.watering_enabled,
        )
        .map_err(|e| corrupt("an invalid geometry", e.to_string()))
    }
}
