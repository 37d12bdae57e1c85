use lashbook_core::domain::appointment::{Appointment, ReminderKind};
use lashbook_core::domain::slot::SlotKey;

pub fn admin_booked(appointment: &Appointment) -> String {
    format!(
        "New booking {}: {} on {}.\nClient: {} {}{}",
        appointment.id,
        appointment.selection.label(),
        appointment.slot,
        appointment.contact.name,
        appointment.contact.phone,
        handle_suffix(appointment),
    )
}

pub fn admin_canceled(appointment: &Appointment) -> String {
    format!(
        "Booking {} on {} was canceled by the client ({}{}).",
        appointment.id,
        appointment.slot,
        appointment.contact.name,
        handle_suffix(appointment),
    )
}

pub fn admin_moved(appointment: &Appointment, previous: &SlotKey) -> String {
    format!(
        "Booking {} ({}) moved from {} to {}.",
        appointment.id, appointment.contact.name, previous, appointment.slot,
    )
}

pub fn client_canceled(appointment: &Appointment) -> String {
    format!(
        "Your {} appointment on {} has been canceled by the studio.",
        appointment.selection.label(),
        appointment.slot,
    )
}

pub fn client_moved(appointment: &Appointment, previous: &SlotKey) -> String {
    format!(
        "Your {} appointment has been moved from {} to {}.",
        appointment.selection.label(),
        previous,
        appointment.slot,
    )
}

pub fn reminder(kind: ReminderKind, appointment: &Appointment) -> String {
    let when = match kind {
        ReminderKind::DayBefore => "tomorrow",
        ReminderKind::HourBefore => "in one hour",
    };
    format!(
        "Reminder: your {} appointment is {} at {} ({}).",
        appointment.selection.label(),
        when,
        appointment.slot.time_str(),
        appointment.slot.date_str(),
    )
}

fn handle_suffix(appointment: &Appointment) -> String {
    appointment.owner_handle.as_deref().map(|handle| format!(" @{handle}")).unwrap_or_default()
}
