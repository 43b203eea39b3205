// src/scheduler/schedule.rs
use chrono::{DateTime, Local, SubsecRound};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule expression is empty")]
    Empty,

    #[error("Invalid @every interval {expr:?}: {source}")]
    InvalidInterval {
        expr: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Unknown schedule descriptor {0:?}")]
    UnknownDescriptor(String),

    #[error("Expected 5, 6 or 7 cron fields, got {0}")]
    FieldCount(usize),

    #[error("Invalid day of week {0:?}")]
    InvalidDayOfWeek(String),

    #[error("Invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },
}

/// When the health check fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fixed interval in whole seconds, aligned to second boundaries.
    Every(Duration),
    /// Calendar expressions with a leading seconds field; fires whenever
    /// any of them matches.
    Cron(Vec<cron::Schedule>),
}

impl Schedule {
    /// Interval schedule; sub-second parts are dropped, minimum one second.
    pub fn every(interval: Duration) -> Self {
        Schedule::Every(Duration::from_secs(interval.as_secs().max(1)))
    }

    /// First firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Schedule::Every(interval) => {
                let step = chrono::Duration::from_std(*interval).ok()?;
                after.trunc_subsecs(0).checked_add_signed(step)
            }
            Schedule::Cron(schedules) => schedules
                .iter()
                .filter_map(|schedule| schedule.after(&after).next())
                .min(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Every(interval) => {
                write!(f, "@every {}", humantime::format_duration(*interval))
            }
            Schedule::Cron(schedules) => {
                for (i, schedule) in schedules.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", schedule)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ScheduleError::Empty);
        }

        if let Some(rest) = expr.strip_prefix("@every") {
            if rest.starts_with(char::is_whitespace) {
                let rest = rest.trim();
                let interval = humantime::parse_duration(rest).map_err(|source| {
                    ScheduleError::InvalidInterval {
                        expr: rest.to_string(),
                        source,
                    }
                })?;
                return Ok(Schedule::every(interval));
            }
        }

        if expr.starts_with('@') {
            let schedule = parse_cron(expr, descriptor(expr)?)?;
            return Ok(Schedule::Cron(vec![schedule]));
        }

        let fields: Vec<&str> = expr.split_whitespace().collect();
        let schedules = match fields.as_slice() {
            &[minute, hour, day_of_month, month, day_of_week] => {
                let day_of_week_shifted = shift_day_of_week(day_of_week)?;
                if is_restricted(day_of_month) && is_restricted(day_of_week) {
                    // either day field may match, as in standard cron
                    vec![
                        parse_cron(expr, &format!("0 {minute} {hour} {day_of_month} {month} *"))?,
                        parse_cron(expr, &format!("0 {minute} {hour} * {month} {day_of_week_shifted}"))?,
                    ]
                } else {
                    vec![parse_cron(
                        expr,
                        &format!("0 {minute} {hour} {day_of_month} {month} {day_of_week_shifted}"),
                    )?]
                }
            }
            _ if fields.len() == 6 || fields.len() == 7 => vec![parse_cron(expr, &fields.join(" "))?],
            _ => return Err(ScheduleError::FieldCount(fields.len())),
        };
        Ok(Schedule::Cron(schedules))
    }
}

fn parse_cron(expr: &str, normalized: &str) -> Result<cron::Schedule, ScheduleError> {
    cron::Schedule::from_str(normalized).map_err(|e| ScheduleError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// A day field starting with `*` or `?` (including `*/n`) leaves the other
/// day field in charge.
fn is_restricted(field: &str) -> bool {
    !(field.starts_with('*') || field.starts_with('?'))
}

// Six-field equivalents; the day-of-week field uses 1 for Sunday.
fn descriptor(expr: &str) -> Result<&'static str, ScheduleError> {
    match expr {
        "@yearly" | "@annually" => Ok("0 0 0 1 1 *"),
        "@monthly" => Ok("0 0 0 1 * *"),
        "@weekly" => Ok("0 0 0 * * 1"),
        "@daily" | "@midnight" => Ok("0 0 0 * * *"),
        "@hourly" => Ok("0 0 * * * *"),
        other => Err(ScheduleError::UnknownDescriptor(other.to_string())),
    }
}

/// Converts a standard day-of-week field (0-7, Sunday = 0 or 7) to the
/// cron crate's numbering (1-7, Sunday = 1). Stepped parts are expanded to
/// explicit days first. Names and bare wildcards pass through untouched.
fn shift_day_of_week(field: &str) -> Result<String, ScheduleError> {
    let invalid = || ScheduleError::InvalidDayOfWeek(field.to_string());
    // None for day names
    let day = |value: &str| -> Result<Option<u8>, ScheduleError> {
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        match value.parse::<u8>().map_err(|_| invalid())? {
            n @ 0..=7 => Ok(Some(n)),
            _ => Err(invalid()),
        }
    };
    let shift = |n: u8| if n == 7 { 1 } else { n + 1 };

    let mut parts = Vec::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(invalid)?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let bounds = match range {
            "*" | "?" if step.is_none() => {
                parts.push(range.to_string());
                continue;
            }
            "*" | "?" => Some((0, 6)),
            _ => match range.split_once('-') {
                Some((start, end)) => match (day(start)?, day(end)?) {
                    (Some(start), Some(end)) => Some((start, end)),
                    _ => None,
                },
                // `n/step` runs to the end of the week
                None => day(range)?
                    .map(|start| (start, if step.is_some() { start.max(6) } else { start })),
            },
        };
        let Some((start, end)) = bounds else {
            parts.push(part.to_string());
            continue;
        };
        if start > end {
            return Err(invalid());
        }

        match step {
            Some(step) => {
                let mut days: Vec<u8> = (start..=end).step_by(step).map(shift).collect();
                days.sort_unstable();
                days.dedup();
                parts.extend(days.iter().map(u8::to_string));
            }
            None if start == end => parts.push(shift(start).to_string()),
            None if end == 7 => {
                // Sunday wraps to the front of the week
                parts.push("1".to_string());
                parts.push(format!("{}-7", shift(start)));
            }
            None => parts.push(format!("{}-{}", shift(start), shift(end))),
        }
    }
    Ok(parts.join(","))
}
