//! Date and time functions
//!
//! Dates are UTC instants. `TODAY()` and `NOW()` read the clock carried in the
//! evaluation context, never the system clock.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::format::format_datetime;
use crate::value::Value;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_WEEK: f64 = 604_800_000.0;

/// Pattern used when `DATETIME_FORMAT` gets no pattern
const DEFAULT_FORMAT: &str = "YYYY-MM-DD";

/// Date arithmetic unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl Unit {
    fn parse(text: &str) -> EvalResult<Unit> {
        let unit = match text.trim().to_lowercase().as_str() {
            "years" | "year" | "y" => Unit::Years,
            "months" | "month" | "m" => Unit::Months,
            "weeks" | "week" | "w" => Unit::Weeks,
            "days" | "day" | "d" => Unit::Days,
            "hours" | "hour" | "h" => Unit::Hours,
            "minutes" | "minute" | "min" => Unit::Minutes,
            "seconds" | "second" | "s" => Unit::Seconds,
            "milliseconds" | "millisecond" | "ms" => Unit::Milliseconds,
            other => {
                return Err(EvalError::invalid_date(format!(
                    "unknown date unit \"{}\"",
                    other
                )))
            }
        };
        Ok(unit)
    }

    /// Fixed length in milliseconds; calendar units have none
    fn millis(&self) -> Option<f64> {
        match self {
            Unit::Years | Unit::Months => None,
            Unit::Weeks => Some(MS_PER_WEEK),
            Unit::Days => Some(MS_PER_DAY),
            Unit::Hours => Some(MS_PER_HOUR),
            Unit::Minutes => Some(MS_PER_MINUTE),
            Unit::Seconds => Some(MS_PER_SECOND),
            Unit::Milliseconds => Some(1.0),
        }
    }
}

fn date_arg(args: &[Value], index: usize) -> EvalResult<DateTime<Utc>> {
    match args.get(index) {
        Some(Value::DateTime(dt)) => Ok(*dt),
        Some(other) => other.to_datetime(),
        None => Err(EvalError::invalid_date("missing date argument")),
    }
}

fn text_arg<'v>(args: &'v [Value], index: usize, default: &'v str) -> &'v str {
    match args.get(index) {
        Some(Value::String(s)) => s,
        _ => default,
    }
}

fn out_of_range() -> EvalError {
    EvalError::invalid_date("date is out of range")
}

fn add_months(dt: DateTime<Utc>, months: i64) -> EvalResult<DateTime<Utc>> {
    let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| out_of_range())?;
    let shifted = if months >= 0 {
        dt.checked_add_months(Months::new(magnitude))
    } else {
        dt.checked_sub_months(Months::new(magnitude))
    };
    shifted.ok_or_else(out_of_range)
}

/// Whole calendar months from `start` to `end`, truncated toward zero
fn months_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    if end < start {
        return -months_between(end, start);
    }
    let mut months = i64::from(end.year() - start.year()) * 12
        + i64::from(end.month()) - i64::from(start.month());
    // Not a full month yet when the end's day/time is earlier in its month
    let end_key = (end.day(), end.num_seconds_from_midnight(), end.nanosecond());
    let start_key = (start.day(), start.num_seconds_from_midnight(), start.nanosecond());
    if months > 0 && end_key < start_key {
        months -= 1;
    }
    months
}

/// TODAY(): the context clock's date at midnight UTC
pub fn fn_today(_args: &[Value], ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let midnight = ctx
        .now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(out_of_range)?;
    Ok(Value::DateTime(midnight))
}

/// NOW(): the context clock
pub fn fn_now(_args: &[Value], ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::DateTime(ctx.now))
}

/// DATEADD(date, count, unit)
pub fn fn_dateadd(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0)?;
    let count = match args.get(1) {
        Some(Value::Number(n)) => *n,
        _ => 0.0,
    };
    let unit = Unit::parse(text_arg(args, 2, ""))?;

    let result = match unit {
        Unit::Years => add_months(date, (count.trunc() as i64).saturating_mul(12))?,
        Unit::Months => add_months(date, count.trunc() as i64)?,
        fixed => {
            let ms = count * fixed.millis().unwrap_or(1.0);
            // chrono's representable range is far inside this bound
            if !ms.is_finite() || ms.abs() > 1e17 {
                return Err(out_of_range());
            }
            date.checked_add_signed(Duration::milliseconds(ms.round() as i64))
                .ok_or_else(out_of_range)?
        }
    };
    Ok(Value::DateTime(result))
}

/// DATEDIF(start, end, [unit]): signed difference, truncated toward zero
pub fn fn_datedif(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let start = date_arg(args, 0)?;
    let end = date_arg(args, 1)?;
    let unit = Unit::parse(text_arg(args, 2, "days"))?;

    let diff = match unit {
        Unit::Years => (months_between(&start, &end) / 12) as f64,
        Unit::Months => months_between(&start, &end) as f64,
        fixed => {
            let ms = (end - start).num_milliseconds() as f64;
            (ms / fixed.millis().unwrap_or(1.0)).trunc()
        }
    };
    Ok(Value::Number(diff))
}

/// YEAR(date)
pub fn fn_year(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(f64::from(date_arg(args, 0)?.year())))
}

/// MONTH(date), 1-12
pub fn fn_month(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(f64::from(date_arg(args, 0)?.month())))
}

/// DAY(date), 1-31
pub fn fn_day(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(f64::from(date_arg(args, 0)?.day())))
}

/// HOUR(date), 0-23
pub fn fn_hour(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(f64::from(date_arg(args, 0)?.hour())))
}

/// MINUTE(date)
pub fn fn_minute(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(f64::from(date_arg(args, 0)?.minute())))
}

/// SECOND(date)
pub fn fn_second(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(f64::from(date_arg(args, 0)?.second())))
}

/// WEEKDAY(date), 0 = Sunday
pub fn fn_weekday(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let weekday = date_arg(args, 0)?.weekday().num_days_from_sunday();
    Ok(Value::Number(f64::from(weekday)))
}

/// DATETIME_FORMAT(date, [pattern])
pub fn fn_datetime_format(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0)?;
    let pattern = text_arg(args, 1, DEFAULT_FORMAT);
    Ok(Value::String(format_datetime(&date, pattern)))
}

/// DATESTR(date): `YYYY-MM-DD`
pub fn fn_datestr(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0)?;
    Ok(Value::String(format_datetime(&date, DEFAULT_FORMAT)))
}

/// IS_BEFORE(date, other)
pub fn fn_is_before(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(date_arg(args, 0)? < date_arg(args, 1)?))
}

/// IS_AFTER(date, other)
pub fn fn_is_after(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(date_arg(args, 0)? > date_arg(args, 1)?))
}
