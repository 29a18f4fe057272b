//! Date and cost normalization for aggregated right requests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::RightsError;

const SHORT_US_DATE: &str = "%m/%d/%y";
const DAY_MONTH_YEAR: &str = "%d-%m-%Y";

/// Parse one of the accepted date layouts. Empty input means "absent".
///
/// * `M/D/YY` when the value contains `/` and is at most 8 characters,
/// * `DD-MM-YYYY` when the value is exactly 10 characters,
/// * RFC 3339 with optional fractional seconds otherwise.
///
/// Calendar-only layouts resolve to midnight UTC.
pub fn parse_flexible_date(field: &str, raw: &str) -> Result<Option<DateTime<Utc>>, RightsError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let unparsable = || RightsError::invalid(format!("unable to parse {field} time"));

    let parsed = if raw.contains('/') && raw.len() <= 8 {
        NaiveDate::parse_from_str(raw, SHORT_US_DATE)
            .ok()
            .and_then(midnight_utc)
    } else if raw.len() == 10 {
        NaiveDate::parse_from_str(raw, DAY_MONTH_YEAR)
            .ok()
            .and_then(midnight_utc)
    } else {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    };

    match parsed {
        Some(dt) => Ok(Some(dt)),
        None => {
            tracing::debug!(field, raw, "date did not match any accepted layout");
            Err(unparsable())
        }
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Maintenance coverage of a right. Only exists when licences are under maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// All-or-nothing check over (maintenance licences, start, end).
pub fn maintenance_window(
    licences: i32,
    start: &str,
    end: &str,
) -> Result<Option<MaintenanceWindow>, RightsError> {
    match (licences != 0, !start.is_empty(), !end.is_empty()) {
        (false, false, false) => Ok(None),
        (true, true, true) => {
            let start = parse_flexible_date("start", start)?.ok_or_else(all_or_nothing)?;
            let end = parse_flexible_date("end", end)?.ok_or_else(all_or_nothing)?;
            if end <= start {
                return Err(RightsError::invalid("end time is less than start time"));
            }
            Ok(Some(MaintenanceWindow { start, end }))
        }
        _ => Err(all_or_nothing()),
    }
}

fn all_or_nothing() -> RightsError {
    RightsError::invalid(
        "all or no fields should be present( maintenance licenses, start date, end date)",
    )
}

/// Derived cost fields, computed in floating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Costs {
    pub total_purchase: f64,
    pub total_maintenance: f64,
    pub total: f64,
}

impl Costs {
    pub fn compute(
        avg_unit_price: f64,
        licenses_acquired: i32,
        avg_maintenance_unit_price: f64,
        licences_maintenance: i32,
    ) -> Self {
        let total_purchase = avg_unit_price * f64::from(licenses_acquired);
        let total_maintenance = avg_maintenance_unit_price * f64::from(licences_maintenance);
        Self {
            total_purchase,
            total_maintenance,
            total: total_purchase + total_maintenance,
        }
    }

    pub fn to_decimals(&self) -> Result<DecimalCosts, RightsError> {
        Ok(DecimalCosts {
            total_purchase: to_decimal("total purchase cost", self.total_purchase)?,
            total_maintenance: to_decimal("total maintenance cost", self.total_maintenance)?,
            total: to_decimal("total cost", self.total)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalCosts {
    pub total_purchase: Decimal,
    pub total_maintenance: Decimal,
    pub total: Decimal,
}

/// Convert a float amount for storage. NaN and infinities are rejected.
pub fn to_decimal(field: &str, value: f64) -> Result<Decimal, RightsError> {
    Decimal::from_f64(value).ok_or_else(|| RightsError::invalid(format!("invalid {field}")))
}

pub const MAX_SUPPORT_NUMBER_LEN: usize = 16;

pub fn check_support_numbers(numbers: &[String]) -> Result<(), RightsError> {
    if numbers
        .iter()
        .any(|n| n.chars().count() > MAX_SUPPORT_NUMBER_LEN)
    {
        return Err(RightsError::invalid(
            "support number length should be at most 16 characters",
        ));
    }
    Ok(())
}
