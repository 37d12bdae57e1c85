use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use lashbook_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, ContactDetails, ReminderFlags, ReminderKind,
};
use lashbook_core::domain::service::{ExtensionStyle, Service, ServiceSelection};
use lashbook_core::domain::slot::SlotKey;
use lashbook_core::identity::UserId;

use super::{date_param, parse_slot_key, parse_timestamp, AppointmentRepository, RepositoryError};
use crate::DbPool;

pub(crate) const APPOINTMENT_COLUMNS: &str = "id, slot_date, slot_time, owner_id, owner_handle, \
     contact_name, contact_phone, service, style, status, day_reminder_sent, hour_reminder_sent, \
     created_at, updated_at";

pub struct SqlAppointmentRepository {
    pool: DbPool,
}

impl SqlAppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn find_by_id(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.map(appointment_from_row).transpose()
    }

    async fn list_for_owner(
        &self,
        owner: &UserId,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment
             WHERE owner_id = ? AND status = 'active' AND slot_date >= ?
             ORDER BY slot_date ASC, slot_time ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(&owner.0)
            .bind(date_param(from))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(appointment_from_row).collect()
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = if let Some(status) = status {
            let sql = format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointment
                 WHERE slot_date = ? AND status = ?
                 ORDER BY slot_time ASC, created_at ASC"
            );
            sqlx::query(&sql)
                .bind(date_param(date))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointment
                 WHERE slot_date = ?
                 ORDER BY slot_time ASC, created_at ASC"
            );
            sqlx::query(&sql).bind(date_param(date)).fetch_all(&self.pool).await?
        };

        rows.into_iter().map(appointment_from_row).collect()
    }

    async fn list_active_since(
        &self,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment
             WHERE status = 'active' AND slot_date >= ?
             ORDER BY slot_date ASC, slot_time ASC"
        );
        let rows = sqlx::query(&sql).bind(date_param(from)).fetch_all(&self.pool).await?;

        rows.into_iter().map(appointment_from_row).collect()
    }

    async fn mark_reminder_sent(
        &self,
        id: &AppointmentId,
        slot: &SlotKey,
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let sql = match kind {
            ReminderKind::DayBefore => {
                "UPDATE appointment SET day_reminder_sent = 1, updated_at = ?
                 WHERE id = ? AND status = 'active' AND slot_date = ? AND slot_time = ?
                   AND day_reminder_sent = 0"
            }
            ReminderKind::HourBefore => {
                "UPDATE appointment SET hour_reminder_sent = 1, updated_at = ?
                 WHERE id = ? AND status = 'active' AND slot_date = ? AND slot_time = ?
                   AND hour_reminder_sent = 0"
            }
        };
        let updated = sqlx::query(sql)
            .bind(at.to_rfc3339())
            .bind(&id.0)
            .bind(slot.date_str())
            .bind(slot.time_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated == 1)
    }
}

pub(crate) async fn insert_appointment(
    conn: &mut SqliteConnection,
    appointment: &Appointment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO appointment (
            id,
            slot_date,
            slot_time,
            owner_id,
            owner_handle,
            contact_name,
            contact_phone,
            service,
            style,
            status,
            day_reminder_sent,
            hour_reminder_sent,
            created_at,
            updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&appointment.id.0)
    .bind(appointment.slot.date_str())
    .bind(appointment.slot.time_str())
    .bind(&appointment.owner.0)
    .bind(appointment.owner_handle.as_deref())
    .bind(&appointment.contact.name)
    .bind(&appointment.contact.phone)
    .bind(appointment.selection.service.as_str())
    .bind(appointment.selection.style.map(|style| style.as_str()))
    .bind(appointment.status.as_str())
    .bind(appointment.reminders.day_sent)
    .bind(appointment.reminders.hour_sent)
    .bind(appointment.created_at.to_rfc3339())
    .bind(appointment.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn load_appointment(
    conn: &mut SqliteConnection,
    id: &AppointmentId,
) -> Result<Option<Appointment>, RepositoryError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = ?");
    let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&mut *conn).await?;

    row.map(appointment_from_row).transpose()
}

pub(crate) fn appointment_from_row(row: SqliteRow) -> Result<Appointment, RepositoryError> {
    let date = row.try_get::<String, _>("slot_date")?;
    let time = row.try_get::<String, _>("slot_time")?;

    let service_raw = row.try_get::<String, _>("service")?;
    let service = Service::parse(&service_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown service `{service_raw}`")))?;
    let style = row
        .try_get::<Option<String>, _>("style")?
        .map(|value| {
            ExtensionStyle::parse(&value)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown style `{value}`")))
        })
        .transpose()?;

    let status_raw = row.try_get::<String, _>("status")?;
    let status = AppointmentStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown appointment status `{status_raw}`"))
    })?;

    Ok(Appointment {
        id: AppointmentId(row.try_get("id")?),
        slot: parse_slot_key(&date, &time)?,
        owner: UserId(row.try_get("owner_id")?),
        owner_handle: row.try_get("owner_handle")?,
        contact: ContactDetails {
            name: row.try_get("contact_name")?,
            phone: row.try_get("contact_phone")?,
        },
        selection: ServiceSelection { service, style },
        status,
        reminders: ReminderFlags {
            day_sent: row.try_get("day_reminder_sent")?,
            hour_sent: row.try_get("hour_reminder_sent")?,
        },
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
