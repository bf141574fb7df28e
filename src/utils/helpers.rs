//! Helper functions and utilities
//!
//! Formatting for prices, traffic and durations shown in chat, plus code and
//! id generators.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::Rng;
use uuid::Uuid;

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a new UUID v4
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a referral code from uppercase letters and digits
pub fn generate_referral_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect()
}

/// Generate a payment transaction id: 16 hex chars of a v4 UUID
pub fn generate_transaction_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Group digits in thousands: 1250000 -> "1,250,000"
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// Format a price in tomans
pub fn format_price(amount: i64) -> String {
    format!("{} تومان", format_thousands(amount))
}

/// Format a traffic quota given in gigabytes
pub fn format_traffic(traffic_gb: f64) -> String {
    if traffic_gb >= 1024.0 {
        format!("{:.1} TB", traffic_gb / 1024.0)
    } else if traffic_gb.fract() == 0.0 {
        format!("{} GB", traffic_gb as i64)
    } else {
        format!("{:.2} GB", traffic_gb)
    }
}

/// Format a duration in days as years, months (30 days) and days
pub fn format_days(days: i32) -> String {
    if days >= 365 {
        let years = days / 365;
        let rest = days % 365;
        if rest > 0 {
            format!("{} سال و {} روز", years, rest)
        } else {
            format!("{} سال", years)
        }
    } else if days >= 30 {
        let months = days / 30;
        let rest = days % 30;
        if rest > 0 {
            format!("{} ماه و {} روز", months, rest)
        } else {
            format!("{} ماه", months)
        }
    } else {
        format!("{} روز", days)
    }
}

/// Expiry timestamp for a subscription starting now
pub fn calculate_expiry(days: i32) -> DateTime<Utc> {
    Utc::now() + Duration::days(days as i64)
}

/// Midnight UTC of the calendar day `at` falls on
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Check whether a timestamp lies in the past
pub fn is_expired(expiry: DateTime<Utc>) -> bool {
    Utc::now() > expiry
}

/// Format a timestamp as a calendar date
pub fn format_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y/%m/%d").to_string()
}

/// Format a timestamp with minutes
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y/%m/%d %H:%M").to_string()
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape text interpolated into HTML-formatted messages
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Offset for 1-based page numbers
pub fn calculate_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1) * per_page
}

/// Number of pages needed to show `total` items, at least one
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 || per_page <= 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}

/// Display name for a user, falling back to the username and then the id
pub fn display_name(first_name: Option<&str>, last_name: Option<&str>, username: Option<&str>, id: i64) -> String {
    let full = format!("{} {}", first_name.unwrap_or(""), last_name.unwrap_or(""))
        .trim()
        .to_string();
    if !full.is_empty() {
        full
    } else if let Some(username) = username {
        format!("@{}", username)
    } else {
        format!("#{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0), "0 تومان");
        assert_eq!(format_price(950), "950 تومان");
        assert_eq!(format_price(50_000), "50,000 تومان");
        assert_eq!(format_price(1_250_000), "1,250,000 تومان");
    }

    #[test]
    fn test_start_of_day() {
        use chrono::TimeZone;

        let just_after = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 5).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(start_of_day(just_after), midnight);
        assert_eq!(start_of_day(midnight), midnight);

        // late yesterday is not today, even though it is under a day ago
        let late_yesterday = Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap();
        assert!(late_yesterday < start_of_day(just_after));
        assert_eq!(start_of_day(late_yesterday), Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_format_thousands_negative() {
        assert_eq!(format_thousands(-120_000), "-120,000");
    }

    #[test]
    fn test_format_traffic() {
        assert_eq!(format_traffic(50.0), "50 GB");
        assert_eq!(format_traffic(1024.0), "1.0 TB");
        assert_eq!(format_traffic(1536.0), "1.5 TB");
        assert_eq!(format_traffic(2.5), "2.50 GB");
    }

    #[test]
    fn test_format_days() {
        assert_eq!(format_days(7), "7 روز");
        assert_eq!(format_days(30), "1 ماه");
        assert_eq!(format_days(45), "1 ماه و 15 روز");
        assert_eq!(format_days(365), "1 سال");
        assert_eq!(format_days(400), "1 سال و 35 روز");
    }

    #[test]
    fn test_generate_referral_code() {
        let code = generate_referral_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_transaction_id() {
        let id = generate_transaction_id();
        assert_eq!(id.len(), 16);
        assert!(!id.contains('-'));
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pagination() {
        assert_eq!(calculate_offset(1, 10), 0);
        assert_eq!(calculate_offset(3, 10), 20);
        assert_eq!(calculate_offset(0, 10), 0);
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn test_truncate_text_is_char_aware() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("سلام دنیا خوش آمدید", 8), "سلام ...");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Some("Ali"), Some("Rezaei"), None, 1), "Ali Rezaei");
        assert_eq!(display_name(None, None, Some("ali"), 1), "@ali");
        assert_eq!(display_name(None, None, None, 42), "#42");
    }

    #[test]
    fn test_expiry() {
        assert!(!is_expired(calculate_expiry(30)));
        assert!(is_expired(Utc::now() - Duration::days(1)));
    }
}
