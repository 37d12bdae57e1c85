use lashbook_core::domain::appointment::AppointmentStatus;
use lashbook_core::domain::slot::DATE_FORMAT;
use lashbook_db::{AppointmentRepository, SqlAppointmentRepository};

use crate::commands::{
    date_arg, finish, load_config, open_ledger, runtime, CommandResult, Failure,
};

/// Operator day view. The CLI runs with database access, so no admin identity is checked.
pub fn run(date: &str) -> CommandResult {
    let date = match date_arg("day", date) {
        Ok(date) => date,
        Err(failure) => return failure,
    };
    let config = match load_config("day") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("day") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_ledger(&config).await?;
        let appointments = SqlAppointmentRepository::new(pool.clone())
            .list_for_date(date, Some(AppointmentStatus::Active))
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        pool.close().await;

        if appointments.is_empty() {
            return Ok(format!("no appointments on {}", date.format(DATE_FORMAT)));
        }
        let lines: Vec<String> = appointments
            .iter()
            .map(|appointment| {
                format!(
                    "{} {} - {} {} [{}]",
                    appointment.slot.time_str(),
                    appointment.selection.label(),
                    appointment.contact.name,
                    appointment.contact.phone,
                    appointment.id,
                )
            })
            .collect();
        Ok::<String, Failure>(lines.join("\n"))
    });

    finish("day", result)
}
