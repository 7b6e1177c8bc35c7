use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{Display, EnumString};

pub const SECONDS_PER_HOUR: u64 = 3_600;

/// Sampling cadences an EnergyPlus-style result store can report at.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[strum(ascii_case_insensitive)]
pub enum ReportingFrequency {
    #[serde(rename = "HVAC System Timestep")]
    #[strum(serialize = "HVAC System Timestep")]
    HvacSystemTimestep,
    #[serde(rename = "Zone Timestep")]
    #[strum(serialize = "Zone Timestep")]
    ZoneTimestep,
    #[default]
    Hourly,
    Daily,
    Monthly,
    #[serde(rename = "Run Period")]
    #[strum(serialize = "Run Period")]
    RunPeriod,
}

/// Infer a fixed cadence from a timestamp index.
///
/// Returns `None` when there are fewer than two timestamps or when consecutive
/// timestamps are not evenly spaced.
pub fn infer_cadence(index: &[NaiveDateTime]) -> Option<Duration> {
    let mut steps = index.windows(2).map(|pair| pair[1] - pair[0]);
    let first = steps.next()?;
    if first <= TimeDelta::zero() || steps.any(|step| step != first) {
        return None;
    }

    first.to_std().ok()
}

pub fn is_hourly(index: &[NaiveDateTime]) -> bool {
    infer_cadence(index) == Some(Duration::from_secs(SECONDS_PER_HOUR))
}

/// Build an hourly index of `hours` timestamps starting at midnight on January 1st of `year`.
pub fn hourly_index(year: i32, hours: usize) -> Vec<NaiveDateTime> {
    let start = chrono::NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default();

    (0..hours)
        .map(|hour| start + TimeDelta::hours(hour as i64))
        .collect()
}
