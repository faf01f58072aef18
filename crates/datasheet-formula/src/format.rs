//! Number and date rendering shared by `DATETIME_FORMAT` and result display

use chrono::{DateTime, Datelike, Timelike, Utc};
use lazy_regex::regex;
use rust_decimal::{Decimal, RoundingStrategy};

/// Pattern used for date-time values when no format hint is available
pub const DEFAULT_DATETIME_PATTERN: &str = "YYYY-MM-DD HH:mm";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Locale-free text for a number at full precision
///
/// Integral values print without a fractional part.
pub fn number_to_text(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        // -0 prints as 0
        return format!("{}", n as i64);
    }
    format!("{}", n)
}

/// Round to `digits` decimal places (negative digits round left of the point)
pub fn round_with(n: f64, digits: i32, strategy: RoundingStrategy) -> f64 {
    if !n.is_finite() {
        return n;
    }
    // Past f64's exponent range the scale factor is no longer finite
    let digits = digits.clamp(-308, 308);

    if (0..=28).contains(&digits) {
        if let Ok(d) = Decimal::try_from(n) {
            let rounded = d.round_dp_with_strategy(digits as u32, strategy);
            if let Ok(v) = f64::try_from(rounded) {
                return v;
            }
        }
    }

    // Scale fallback for negative digits and out-of-range magnitudes
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits < 0 { n / factor } else { n * factor };
    if !scaled.is_finite() {
        return n;
    }
    let rounded = match strategy {
        RoundingStrategy::ToZero => scaled.trunc(),
        RoundingStrategy::AwayFromZero => {
            if scaled >= 0.0 {
                scaled.ceil()
            } else {
                scaled.floor()
            }
        }
        // Half away from zero
        _ => scaled.round(),
    };
    if digits < 0 {
        rounded * factor
    } else {
        rounded / factor
    }
}

/// Round half away from zero
pub fn round_half_away(n: f64, digits: i32) -> f64 {
    round_with(n, digits, RoundingStrategy::MidpointAwayFromZero)
}

/// Render a number with a fixed number of decimal places
///
/// # Example
/// ```rust
/// use datasheet_formula::format::format_precision;
///
/// assert_eq!(format_precision(2.5, 0), "3");
/// assert_eq!(format_precision(1.0, 2), "1.00");
/// ```
pub fn format_precision(n: f64, precision: u8) -> String {
    let precision = precision.min(20);
    match Decimal::try_from(n) {
        Ok(d) => {
            let mut d = d.round_dp_with_strategy(
                u32::from(precision),
                RoundingStrategy::MidpointAwayFromZero,
            );
            d.rescale(u32::from(precision));
            if d.is_zero() {
                d.set_sign_positive(true);
            }
            d.to_string()
        }
        Err(_) if n.is_finite() => format!("{:.*}", usize::from(precision), n),
        Err(_) => number_to_text(n),
    }
}

/// Render a date-time with a token pattern
///
/// Tokens: `YYYY YY MMMM MMM MM M DD D dddd ddd d HH H hh h mm m ss s SSS A a`.
/// Text inside `[...]` is copied literally; anything else passes through.
pub fn format_datetime(dt: &DateTime<Utc>, pattern: &str) -> String {
    let re = regex!(r"\[([^\]]*)\]|YYYY|YY|MMMM|MMM|MM|M|DD|D|dddd|ddd|d|HH|H|hh|h|mm|m|ss|s|SSS|A|a");

    re.replace_all(pattern, |caps: &regex::Captures<'_>| {
        if let Some(literal) = caps.get(1) {
            return literal.as_str().to_string();
        }
        let hour12 = match dt.hour() % 12 {
            0 => 12,
            h => h,
        };
        let month = MONTH_NAMES[dt.month0() as usize];
        let weekday = WEEKDAY_NAMES[dt.weekday().num_days_from_sunday() as usize];

        match &caps[0] {
            "YYYY" => format!("{:04}", dt.year()),
            "YY" => format!("{:02}", dt.year().rem_euclid(100)),
            "MMMM" => month.to_string(),
            "MMM" => month[..3].to_string(),
            "MM" => format!("{:02}", dt.month()),
            "M" => dt.month().to_string(),
            "DD" => format!("{:02}", dt.day()),
            "D" => dt.day().to_string(),
            "dddd" => weekday.to_string(),
            "ddd" => weekday[..3].to_string(),
            "d" => dt.weekday().num_days_from_sunday().to_string(),
            "HH" => format!("{:02}", dt.hour()),
            "H" => dt.hour().to_string(),
            "hh" => format!("{:02}", hour12),
            "h" => hour12.to_string(),
            "mm" => format!("{:02}", dt.minute()),
            "m" => dt.minute().to_string(),
            "ss" => format!("{:02}", dt.second()),
            "s" => dt.second().to_string(),
            "SSS" => format!("{:03}", dt.timestamp_subsec_millis()),
            "A" => if dt.hour() < 12 { "AM" } else { "PM" }.to_string(),
            "a" => if dt.hour() < 12 { "am" } else { "pm" }.to_string(),
            other => other.to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_number_to_text() {
        assert_eq!(number_to_text(2.0), "2");
        assert_eq!(number_to_text(-0.0), "0");
        assert_eq!(number_to_text(0.5), "0.5");
        assert_eq!(number_to_text(1e20), "100000000000000000000");
        assert_eq!(number_to_text(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_half_away(2.5, 0), 3.0);
        assert_eq!(round_half_away(-2.5, 0), -3.0);
        assert_eq!(round_half_away(2.4, 0), 2.0);
        assert_eq!(round_half_away(1.005, 2), 1.01);
        assert_eq!(round_half_away(1234.0, -2), 1200.0);
        assert_eq!(round_half_away(1250.0, -2), 1300.0);
    }

    #[test]
    fn test_round_up_down() {
        assert_eq!(round_with(1.21, 1, RoundingStrategy::AwayFromZero), 1.3);
        assert_eq!(round_with(-1.21, 1, RoundingStrategy::AwayFromZero), -1.3);
        assert_eq!(round_with(1.29, 1, RoundingStrategy::ToZero), 1.2);
        assert_eq!(round_with(1299.0, -2, RoundingStrategy::ToZero), 1200.0);
    }

    #[test]
    fn test_format_precision() {
        assert_eq!(format_precision(10.0, 0), "10");
        assert_eq!(format_precision(3.14159, 2), "3.14");
        assert_eq!(format_precision(2.345, 2), "2.35");
        assert_eq!(format_precision(1.0, 3), "1.000");
        assert_eq!(format_precision(-0.0001, 2), "0.00");
        assert_eq!(format_precision(-1.5, 0), "-2");
    }

    #[test]
    fn test_format_datetime() {
        let t = dt(2024, 3, 5, 14, 7, 9);
        assert_eq!(format_datetime(&t, "YYYY/MM/DD"), "2024/03/05");
        assert_eq!(format_datetime(&t, "YYYY-MM-DD HH:mm"), "2024-03-05 14:07");
        assert_eq!(format_datetime(&t, "hh:mm A"), "02:07 PM");
        assert_eq!(format_datetime(&t, "D MMM YY"), "5 Mar 24");
        assert_eq!(format_datetime(&t, "dddd, MMMM D"), "Tuesday, March 5");
        assert_eq!(format_datetime(&t, "[Day] D"), "Day 5");
        assert_eq!(format_datetime(&t, "HH:mm:ss.SSS"), "14:07:09.000");
    }

    #[test]
    fn test_midnight_is_twelve_am() {
        let t = dt(2024, 1, 1, 0, 30, 0);
        assert_eq!(format_datetime(&t, "h:mm a"), "12:30 am");
    }
}
