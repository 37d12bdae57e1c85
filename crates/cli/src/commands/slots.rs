use chrono::{NaiveTime, Utc};
use lashbook_core::domain::slot::{parse_time, SlotKey, DATE_FORMAT};
use lashbook_db::{SlotRemoval, SlotRepository, SqlSlotRepository};

use crate::commands::{
    date_arg, finish, load_config, open_ledger, runtime, CommandResult, Failure,
};

pub fn add(date: &str, times: &str) -> CommandResult {
    let date = match date_arg("slots.add", date) {
        Ok(date) => date,
        Err(failure) => return failure,
    };
    let times = match time_list(times) {
        Ok(times) => times,
        Err(failure) => return failure,
    };
    let config = match load_config("slots.add") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("slots.add") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_ledger(&config).await?;
        let slots = SqlSlotRepository::new(pool.clone());

        let mut created = Vec::new();
        let mut existing = Vec::new();
        for time in times {
            let key = SlotKey::new(date, time);
            let inserted = slots
                .insert_slot(key, Utc::now())
                .await
                .map_err(|error| ("persistence", error.to_string(), 4u8))?;
            if inserted {
                created.push(key.time_str());
            } else {
                existing.push(key.time_str());
            }
        }
        pool.close().await;

        Ok::<String, Failure>(format!(
            "{}: created [{}], already present [{}]",
            date.format(DATE_FORMAT),
            created.join(", "),
            existing.join(", ")
        ))
    });

    finish("slots.add", result)
}

pub fn list(date: &str) -> CommandResult {
    let date = match date_arg("slots.list", date) {
        Ok(date) => date,
        Err(failure) => return failure,
    };
    let config = match load_config("slots.list") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("slots.list") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_ledger(&config).await?;
        let found = SqlSlotRepository::new(pool.clone())
            .list_for_date(date, false)
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        pool.close().await;

        if found.is_empty() {
            return Ok(format!("no slots on {}", date.format(DATE_FORMAT)));
        }
        let lines: Vec<String> = found
            .iter()
            .map(|slot| {
                let state = if slot.is_open { "open" } else { "booked" };
                format!("{} {state}", slot.key.time_str())
            })
            .collect();
        Ok::<String, Failure>(lines.join("\n"))
    });

    finish("slots.list", result)
}

pub fn remove(date: &str, time: &str) -> CommandResult {
    let date = match date_arg("slots.remove", date) {
        Ok(date) => date,
        Err(failure) => return failure,
    };
    let Some(time) = parse_time(time) else {
        return invalid_time("slots.remove", time);
    };
    let config = match load_config("slots.remove") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("slots.remove") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let key = SlotKey::new(date, time);
    let result = runtime.block_on(async {
        let pool = open_ledger(&config).await?;
        let removal = SqlSlotRepository::new(pool.clone())
            .delete_slot(&key)
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        pool.close().await;

        match removal {
            SlotRemoval::Deleted => Ok::<String, Failure>(format!("removed slot {key}")),
            SlotRemoval::NotFound => Err(("not_found", format!("no slot at {key}"), 6u8)),
            SlotRemoval::Referenced => Err((
                "slot_referenced",
                format!("slot {key} has appointments and cannot be removed"),
                6u8,
            )),
        }
    });

    finish("slots.remove", result)
}

fn time_list(raw: &str) -> Result<Vec<NaiveTime>, CommandResult> {
    let mut times = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match parse_time(part) {
            Some(time) if !times.contains(&time) => times.push(time),
            Some(_) => {}
            None => return Err(invalid_time("slots.add", part)),
        }
    }
    if times.is_empty() {
        return Err(CommandResult::failure(
            "slots.add",
            "invalid_argument",
            "--times needs at least one HH:MM value",
            1,
        ));
    }
    times.sort();
    Ok(times)
}

fn invalid_time(command: &str, value: &str) -> CommandResult {
    CommandResult::failure(
        command,
        "invalid_argument",
        format!("`{value}` is not a time in HH:MM form"),
        1,
    )
}
