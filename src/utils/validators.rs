//! Input validators for user-typed values

use std::sync::OnceLock;
use regex::Regex;

/// Largest single amount accepted from chat input, in tomans
pub const MAX_AMOUNT: i64 = 100_000_000;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^09\d{9}$").expect("valid phone regex"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]{3,30}$").expect("valid username regex"))
}

/// Iranian mobile number, e.g. 09123456789
pub fn validate_phone(phone: &str) -> bool {
    phone_regex().is_match(phone.trim())
}

pub fn validate_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

/// 3 to 30 characters of letters, digits and underscore
pub fn validate_username(username: &str) -> bool {
    username_regex().is_match(username)
}

/// Check an amount is positive and below the global cap
pub fn validate_amount(amount: i64) -> std::result::Result<(), &'static str> {
    if amount <= 0 {
        return Err("amount must be greater than zero");
    }
    if amount > MAX_AMOUNT {
        return Err("amount exceeds the allowed maximum");
    }
    Ok(())
}

/// Parse an amount typed by a user, tolerating thousands separators
pub fn parse_amount(input: &str) -> Option<i64> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '٬'))
        .map(normalize_digit)
        .collect();
    cleaned.parse::<i64>().ok()
}

/// Yes/no answers in either language
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "true" | "1" | "بله" | "فعال"
    )
}

/// Map Persian and Arabic-Indic digits to ASCII
pub fn normalize_digit(c: char) -> char {
    match c {
        '۰'..='۹' => char::from_digit(c as u32 - '۰' as u32, 10).unwrap_or(c),
        '٠'..='٩' => char::from_digit(c as u32 - '٠' as u32, 10).unwrap_or(c),
        _ => c,
    }
}

/// 16-digit bank card number with a valid Luhn checksum
pub fn validate_bank_card(card_number: &str) -> bool {
    let digits: String = card_number.chars().filter(|c| *c != ' ' && *c != '-').collect();
    if digits.len() != 16 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    luhn_check(&digits)
}

fn luhn_check(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}
