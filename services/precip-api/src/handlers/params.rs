//! Query parameter helpers shared by handlers.

use grid_cache::{AggregateMode, Period, PrecipError};

use crate::error::{ApiError, ApiResult};

/// Period used when a request names none.
pub const DEFAULT_PERIOD: Period = Period::ym(2025, 12);

/// Subsample step used when a request names none.
pub const DEFAULT_SUBSAMPLE: usize = 2;

pub fn period(raw: Option<&str>) -> ApiResult<Period> {
    match raw {
        None => Ok(DEFAULT_PERIOD),
        Some(s) => s
            .parse()
            .map_err(|_| PrecipError::InvalidPeriod(s.trim().to_string()).into()),
    }
}

/// Comma separated period list, e.g. `202412,202501`.
pub fn periods(raw: Option<&str>) -> ApiResult<Vec<Period>> {
    let Some(raw) = raw else {
        return Ok(vec![DEFAULT_PERIOD]);
    };
    let periods = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| period(Some(s)))
        .collect::<ApiResult<Vec<_>>>()?;
    if periods.is_empty() {
        return Err(ApiError::bad_request("period list is empty"));
    }
    Ok(periods)
}

pub fn mode(raw: Option<&str>) -> ApiResult<AggregateMode> {
    match raw {
        None => Ok(AggregateMode::Daily),
        Some(s) => s.parse().map_err(ApiError::BadRequest),
    }
}

pub fn coordinate(value: f64, name: &str) -> ApiResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ApiError::bad_request(format!("{name} must be finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_defaults_and_errors() {
        assert_eq!(period(None).unwrap(), DEFAULT_PERIOD);
        assert_eq!(period(Some("202501")).unwrap(), Period::ym(2025, 1));
        assert!(matches!(
            period(Some("2025-01")),
            Err(ApiError::Engine(PrecipError::InvalidPeriod(p))) if p == "2025-01"
        ));
    }

    #[test]
    fn test_period_list() {
        let list = periods(Some("202501, 202412,")).unwrap();
        assert_eq!(list, vec![Period::ym(2025, 1), Period::ym(2024, 12)]);
        assert!(periods(Some(",")).is_err());
        assert!(periods(Some("202501,bad")).is_err());
    }

    #[test]
    fn test_mode() {
        assert_eq!(mode(None).unwrap(), AggregateMode::Daily);
        assert_eq!(mode(Some("dekadal")).unwrap(), AggregateMode::Dekadal);
        assert!(matches!(mode(Some("weekly")), Err(ApiError::BadRequest(_))));
    }
}
