use std::{fmt, str::FromStr, time::Duration};

/// Recording duration given on the command line.
///
/// Accepts plain seconds (`90`, `1.5`) or unit-suffixed components such as `1h30m`,
/// `45s` and `500ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordDuration(pub Duration);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError(String);

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration: {}", self.0)
    }
}

impl std::error::Error for ParseDurationError {}

impl FromStr for RecordDuration {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDurationError(s.to_string());
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid());
        }

        if let Ok(seconds) = s.parse::<f64>() {
            return Duration::try_from_secs_f64(seconds)
                .map(Self)
                .map_err(|_| invalid());
        }

        let mut total = Duration::ZERO;
        let mut rest = s;
        while !rest.is_empty() {
            let number_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(invalid)?;
            let (number, tail) = rest.split_at(number_end);
            let unit_end = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_end);

            let value: f64 = number.parse().map_err(|_| invalid())?;
            let seconds = match unit {
                "ms" => value / 1000.0,
                "s" => value,
                "m" => value * 60.0,
                "h" => value * 3600.0,
                _ => return Err(invalid()),
            };
            total += Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
            rest = tail;
        }

        Ok(Self(total))
    }
}
