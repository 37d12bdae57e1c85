use crate::domain::service::{ExtensionStyle, Service};

const MIN_PHONE_DIGITS: usize = 9;
const MAX_PHONE_DIGITS: usize = 15;

/// Collapses whitespace and requires at least two characters and one word with a letter.
pub fn validate_name(input: &str) -> Option<String> {
    let tokens = input.split_whitespace().collect::<Vec<_>>();
    if !tokens.iter().any(|token| token.chars().any(char::is_alphabetic)) {
        return None;
    }

    let name = tokens.join(" ");
    (name.chars().count() >= 2).then_some(name)
}

/// Keeps digits and `+`, accepting 9 to 15 digits.
pub fn normalize_phone(input: &str) -> Option<String> {
    let phone =
        input.chars().filter(|ch| ch.is_ascii_digit() || *ch == '+').collect::<String>();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits).then_some(phone)
}

pub fn parse_service(input: &str) -> Option<Service> {
    let input = input.trim();
    match input {
        "1" => Some(Service::Lamination),
        "2" => Some(Service::Extension),
        other => Service::parse(other),
    }
}

pub fn parse_style(input: &str) -> Option<ExtensionStyle> {
    let input = input.trim();
    match input {
        "1" => Some(ExtensionStyle::Classic),
        "2" => Some(ExtensionStyle::TwoD),
        "3" => Some(ExtensionStyle::ThreeD),
        other => ExtensionStyle::parse(other),
    }
}

pub fn parse_confirmation(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "confirm" | "ok" => Some(true),
        "no" | "n" | "cancel" => Some(false),
        _ => None,
    }
}
