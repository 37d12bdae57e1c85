use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use lashbook_core::domain::slot::{Slot, SlotKey};

use super::{
    date_param, parse_slot_key, parse_timestamp, RepositoryError, SlotRemoval, SlotRepository,
};
use crate::DbPool;

pub struct SqlSlotRepository {
    pool: DbPool,
}

impl SqlSlotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SlotRepository for SqlSlotRepository {
    async fn insert_slot(
        &self,
        key: SlotKey,
        created_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO slot (slot_date, slot_time, is_open, created_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT(slot_date, slot_time) DO NOTHING",
        )
        .bind(key.date_str())
        .bind(key.time_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    async fn find_slot(&self, key: &SlotKey) -> Result<Option<Slot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT slot_date, slot_time, is_open, created_at
             FROM slot
             WHERE slot_date = ? AND slot_time = ?",
        )
        .bind(key.date_str())
        .bind(key.time_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(slot_from_row).transpose()
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        open_only: bool,
    ) -> Result<Vec<Slot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT slot_date, slot_time, is_open, created_at
             FROM slot
             WHERE slot_date = ? AND (is_open = 1 OR ? = 0)
             ORDER BY slot_time ASC",
        )
        .bind(date_param(date))
        .bind(open_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(slot_from_row).collect()
    }

    async fn delete_slot(&self, key: &SlotKey) -> Result<SlotRemoval, RepositoryError> {
        let deleted = sqlx::query(
            "DELETE FROM slot
             WHERE slot_date = ? AND slot_time = ?
               AND NOT EXISTS (
                   SELECT 1 FROM appointment
                   WHERE appointment.slot_date = slot.slot_date
                     AND appointment.slot_time = slot.slot_time
               )",
        )
        .bind(key.date_str())
        .bind(key.time_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted == 1 {
            return Ok(SlotRemoval::Deleted);
        }

        match self.find_slot(key).await? {
            Some(_) => Ok(SlotRemoval::Referenced),
            None => Ok(SlotRemoval::NotFound),
        }
    }
}

fn slot_from_row(row: SqliteRow) -> Result<Slot, RepositoryError> {
    let date = row.try_get::<String, _>("slot_date")?;
    let time = row.try_get::<String, _>("slot_time")?;

    Ok(Slot {
        key: parse_slot_key(&date, &time)?,
        is_open: row.try_get("is_open")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
