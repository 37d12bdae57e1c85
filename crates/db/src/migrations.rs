use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "slot",
        "appointment",
        "idx_appointment_active_slot",
        "idx_appointment_owner",
        "idx_appointment_status_date",
    ];

    #[tokio::test]
    async fn migrations_create_booking_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in ["slot", "appointment"] {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "table `{table}` should exist");
        }
    }

    #[tokio::test]
    async fn schema_rejects_a_second_active_appointment_for_a_slot() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO slot (slot_date, slot_time, is_open, created_at)
             VALUES ('2026-03-05', '10:00', 0, '2026-03-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert slot");

        let insert = |id: &'static str, status: &'static str| {
            let pool = pool.clone();
            async move {
                sqlx::query(
                    "INSERT INTO appointment (id, slot_date, slot_time, owner_id, contact_name,
                                              contact_phone, service, status, created_at,
                                              updated_at)
                     VALUES (?, '2026-03-05', '10:00', '42', 'Maria K', '+380991234567',
                             'lamination', ?, '2026-03-01T10:00:00Z', '2026-03-01T10:00:00Z')",
                )
                .bind(id)
                .bind(status)
                .execute(&pool)
                .await
            }
        };

        insert("apt-1", "canceled").await.expect("canceled history is allowed");
        insert("apt-2", "active").await.expect("first active appointment");
        assert!(insert("apt-3", "active").await.is_err(), "second active appointment must fail");
    }

    #[tokio::test]
    async fn appointments_must_reference_an_existing_slot() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO appointment (id, slot_date, slot_time, owner_id, contact_name,
                                      contact_phone, service, status, created_at, updated_at)
             VALUES ('apt-1', '2026-03-05', '10:00', '42', 'Maria K', '+380991234567',
                     'lamination', 'active', '2026-03-01T10:00:00Z', '2026-03-01T10:00:00Z')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "foreign key to slot should be enforced");
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
