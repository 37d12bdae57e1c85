use chrono::{NaiveDate, NaiveTime};

use lashbook_core::domain::appointment::Appointment;
use lashbook_core::domain::service::{ExtensionStyle, Service};
use lashbook_core::domain::slot::{DATE_FORMAT, TIME_FORMAT};
use lashbook_core::errors::BookingRejection;
use lashbook_core::flows::Prompt;

pub const MAIN_MENU: &str = "Welcome to the lash studio!\n\
/start - book an appointment\n\
/bookings - your upcoming appointments\n\
/cancel <number> - cancel one of them\n\
/restart - drop the booking in progress";

pub fn prompt(prompt: &Prompt) -> String {
    match prompt {
        Prompt::MainMenu => MAIN_MENU.to_owned(),
        Prompt::ChooseService => numbered(
            "Which service would you like?",
            Service::ALL.iter().map(|service| service.label()),
        ),
        Prompt::ChooseStyle => numbered(
            "Which extension style?",
            ExtensionStyle::ALL.iter().map(|style| style.label()),
        ),
        Prompt::ChooseDate => "Send the date you would like (YYYY-MM-DD).".to_owned(),
        Prompt::InvalidDate => {
            "That date cannot be booked. Send a date from today on, as YYYY-MM-DD.".to_owned()
        }
        Prompt::NoAvailability { date } => {
            format!("There are no free times on {}. Please choose another date.", day(date))
        }
        Prompt::ChooseTime { date, times } => {
            format!("Free times on {}:\n{}\nSend the time you would like.", day(date), clock(times))
        }
        Prompt::InvalidTime { date, times } => {
            format!("Please pick one of the free times on {}:\n{}", day(date), clock(times))
        }
        Prompt::EnterName => "What is your name?".to_owned(),
        Prompt::InvalidName => "Please send your name, at least 2 characters.".to_owned(),
        Prompt::EnterPhone => "What is your phone number?".to_owned(),
        Prompt::InvalidPhone => {
            "That does not look like a phone number. Send 9 to 15 digits, e.g. +380991234567."
                .to_owned()
        }
        Prompt::Confirm(request) => format!(
            "Please check your booking:\n{}\n{}\n{}, {}\nReply yes to confirm or no to cancel.",
            request.selection.label(),
            request.slot,
            request.contact.name,
            request.contact.phone,
        ),
        Prompt::Booked { slot, .. } => format!("You are booked for {slot}. See you then!"),
        Prompt::SlotLost { slot } => {
            format!("Sorry, {slot} was just taken by someone else.")
        }
        Prompt::Discarded => "Booking discarded.".to_owned(),
        Prompt::StartOver => "Let's start over. Send /start to book an appointment.".to_owned(),
        Prompt::TryAgainLater => {
            "Something went wrong on our side. Please try again in a moment.".to_owned()
        }
    }
}

/// A client's own list, numbered for `/cancel <number>`.
pub fn my_bookings(appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return "You have no upcoming appointments.".to_owned();
    }
    numbered(
        "Your upcoming appointments:",
        appointments
            .iter()
            .map(|appointment| format!("{} {}", appointment.slot, appointment.selection.label())),
    )
}

/// Admin day view with contact details and ids for `/cancel` and `/move`.
pub fn day_view(date: &NaiveDate, appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return format!("No appointments on {}.", day(date));
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
    format!("Appointments on {}:\n{}", day(date), lines.join("\n"))
}

pub fn rejection(rejection: &BookingRejection) -> String {
    match rejection {
        BookingRejection::SlotTaken(slot) => format!("{slot} is already taken."),
        BookingRejection::SlotNotFound(slot) => format!("{slot} is not a bookable time."),
        BookingRejection::AppointmentNotFound(_) => "That appointment does not exist.".to_owned(),
        BookingRejection::AppointmentNotActive(_) => {
            "That appointment has already been canceled.".to_owned()
        }
        BookingRejection::NotPermitted(_) => "That appointment is not yours.".to_owned(),
        BookingRejection::AdminOnly(_) => "Only the studio can do that.".to_owned(),
    }
}

fn numbered<I, S>(title: &str, items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = title.to_owned();
    for (idx, item) in items.into_iter().enumerate() {
        text.push_str(&format!("\n{}. {}", idx + 1, item.as_ref()));
    }
    text
}

fn day(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn clock(times: &[NaiveTime]) -> String {
    times.iter().map(|time| time.format(TIME_FORMAT).to_string()).collect::<Vec<_>>().join(", ")
}
