pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::Database;

use crate::error::Result;
use crate::models::Zone;
use chrono::NaiveDate;

/// Date-keyed storage for whole-plan snapshots
pub trait SnapshotStore {
    /// Replace the snapshot for `date`. Either all zones are written or none are.
    fn save_snapshot(&self, date: NaiveDate, zones: &[Zone]) -> Result<()>;

    /// Zones saved for `date` in display order, or empty if nothing was saved.
    fn load_snapshot(&self, date: NaiveDate) -> Result<Vec<Zone>>;
}
