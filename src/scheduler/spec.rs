use crate::error::ScheduleError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// A fixed-interval schedule.
///
/// Accepted forms: `@every 1h30m`, `every 1 hour`, `@hourly`, `@daily`,
/// `@weekly`, or a bare duration such as `90s` or `5 minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    interval: Duration,
}

impl Schedule {
    pub fn every(interval: Duration) -> Result<Self, ScheduleError> {
        if interval.is_zero() {
            return Err(ScheduleError::ZeroInterval(format!("{interval:?}")));
        }
        Ok(Self { interval })
    }

    pub fn parse(spec: &str) -> Result<Self, ScheduleError> {
        let normalized = spec.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let interval = match normalized.as_str() {
            "@hourly" => Duration::from_secs(HOUR),
            "@daily" | "@midnight" => Duration::from_secs(DAY),
            "@weekly" => Duration::from_secs(7 * DAY),
            other => {
                let body = other
                    .strip_prefix("@every")
                    .or_else(|| other.strip_prefix("every"))
                    .unwrap_or(other);
                parse_duration(spec, body)?
            }
        };

        if interval.is_zero() {
            return Err(ScheduleError::ZeroInterval(spec.to_string()));
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@every {:?}", self.interval)
    }
}

/// Parses sequences of `<number><unit>` pairs; whitespace between tokens is ignored.
fn parse_duration(spec: &str, body: &str) -> Result<Duration, ScheduleError> {
    let mut chars = body.trim().chars().peekable();
    if chars.peek().is_none() {
        return Err(ScheduleError::Empty);
    }

    let mut total = Duration::ZERO;
    while chars.peek().is_some() {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut number = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
            number.push(c);
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut unit = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_alphabetic()) {
            unit.push(c);
        }

        if number.is_empty() {
            let leftover: String = chars.collect();
            return Err(ScheduleError::InvalidNumber {
                spec: spec.to_string(),
                number: format!("{unit}{leftover}"),
            });
        }
        if unit.is_empty() {
            return Err(ScheduleError::MissingUnit(spec.to_string()));
        }

        let amount: u64 = number.parse().map_err(|_| ScheduleError::InvalidNumber {
            spec: spec.to_string(),
            number: number.clone(),
        })?;
        total = total.saturating_add(unit_duration(spec, &unit, amount)?);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    Ok(total)
}

fn unit_duration(spec: &str, unit: &str, amount: u64) -> Result<Duration, ScheduleError> {
    let duration = match unit {
        "ms" | "msec" | "millis" | "millisecond" | "milliseconds" => Duration::from_millis(amount),
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs(amount),
        "m" | "min" | "mins" | "minute" | "minutes" => {
            Duration::from_secs(amount.saturating_mul(MINUTE))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::from_secs(amount.saturating_mul(HOUR)),
        "d" | "day" | "days" => Duration::from_secs(amount.saturating_mul(DAY)),
        other => {
            return Err(ScheduleError::UnknownUnit {
                spec: spec.to_string(),
                unit: other.to_string(),
            })
        }
    };
    Ok(duration)
}
