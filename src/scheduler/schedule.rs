//! Cron recurrence for fare checks

use std::str::FromStr;

use cron::Schedule;

use crate::FareWatchError;

/// Parses a cron expression.
///
/// Five-field expressions (`min hour dom mon dow`) run at second zero; six or
/// seven fields are passed through with their leading seconds field.
pub fn parse_schedule(expression: &str) -> crate::Result<Schedule> {
    let trimmed = expression.trim();
    let normalized = match trimmed.split_whitespace().count() {
        5 => format!("0 {trimmed}"),
        6 | 7 => trimmed.to_string(),
        n => {
            return Err(FareWatchError::config(format!(
                "Invalid schedule '{expression}': expected 5 to 7 fields, found {n}"
            )));
        }
    };

    Schedule::from_str(&normalized).map_err(|e| {
        FareWatchError::config(format!("Invalid schedule '{expression}': {e}"))
    })
}
