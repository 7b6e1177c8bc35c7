use crate::core::table::OutputSeriesTable;
use crate::errors::BalanceError;
use crate::simulation_time::{infer_cadence, is_hourly, SECONDS_PER_HOUR};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumString};

pub const JOULES_PER_KILOWATT_HOUR: u32 = 3_600_000;
pub const JOULES_PER_WATT_HOUR: u32 = 3_600;
pub const JOULES_PER_KILOJOULE: u32 = 1_000;
pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub(crate) const JOULES_PER_BTU: f64 = 1_055.055_852_62;
pub(crate) const JOULES_PER_THERM: f64 = 105_505_585.262;

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum EnergyUnit {
    J,
    #[serde(rename = "kJ")]
    #[strum(serialize = "kJ")]
    KJ,
    MJ,
    GJ,
    Wh,
    #[default]
    #[serde(rename = "kWh")]
    #[strum(serialize = "kWh")]
    KWh,
    MWh,
    GWh,
    #[serde(rename = "Btu")]
    #[strum(serialize = "Btu")]
    Btu,
    #[serde(rename = "kBtu")]
    #[strum(serialize = "kBtu")]
    KBtu,
    #[serde(rename = "MBtu")]
    #[strum(serialize = "MBtu")]
    MBtu,
    #[serde(rename = "therm")]
    #[strum(serialize = "therm")]
    Therm,
}

impl EnergyUnit {
    pub fn joules(&self) -> f64 {
        match self {
            EnergyUnit::J => 1.,
            EnergyUnit::KJ => JOULES_PER_KILOJOULE as f64,
            EnergyUnit::MJ => 1e6,
            EnergyUnit::GJ => 1e9,
            EnergyUnit::Wh => JOULES_PER_WATT_HOUR as f64,
            EnergyUnit::KWh => JOULES_PER_KILOWATT_HOUR as f64,
            EnergyUnit::MWh => JOULES_PER_KILOWATT_HOUR as f64 * 1e3,
            EnergyUnit::GWh => JOULES_PER_KILOWATT_HOUR as f64 * 1e6,
            EnergyUnit::Btu => JOULES_PER_BTU,
            EnergyUnit::KBtu => JOULES_PER_BTU * 1e3,
            EnergyUnit::MBtu => JOULES_PER_BTU * 1e6,
            EnergyUnit::Therm => JOULES_PER_THERM,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum PowerUnit {
    W,
    #[default]
    #[serde(rename = "kW")]
    #[strum(serialize = "kW")]
    KW,
    MW,
    #[serde(rename = "Btu/h")]
    #[strum(serialize = "Btu/h")]
    BtuPerHour,
}

impl PowerUnit {
    pub fn watts(&self) -> f64 {
        match self {
            PowerUnit::W => 1.,
            PowerUnit::KW => WATTS_PER_KILOWATT as f64,
            PowerUnit::MW => 1e6,
            PowerUnit::BtuPerHour => JOULES_PER_BTU / SECONDS_PER_HOUR as f64,
        }
    }
}

/// A unit as reported against an output series: either an energy or a rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReportedUnit {
    Energy(EnergyUnit),
    Power(PowerUnit),
}

impl FromStr for ReportedUnit {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(unit) = EnergyUnit::from_str(s) {
            return Ok(ReportedUnit::Energy(unit));
        }
        if let Ok(unit) = PowerUnit::from_str(s) {
            return Ok(ReportedUnit::Power(unit));
        }

        Err(BalanceError::UnknownUnit(s.to_string()))
    }
}

pub fn convert_energy(value: f64, from: EnergyUnit, to: EnergyUnit) -> f64 {
    if from == to {
        return value;
    }
    value * from.joules() / to.joules()
}

pub fn convert_power(value: f64, from: PowerUnit, to: PowerUnit) -> f64 {
    if from == to {
        return value;
    }
    value * from.watts() / to.watts()
}

/// Energy delivered by a constant rate held over `duration`, in the requested energy unit.
pub fn rate_over_duration(
    value: f64,
    power_units: PowerUnit,
    duration: Duration,
    energy_units: EnergyUnit,
) -> f64 {
    value * power_units.watts() * duration.as_secs_f64() / energy_units.joules()
}

/// Convert a table of rates into energy per reporting interval.
///
/// Each column is first brought into `power_units` from the unit it was reported in, then
/// multiplied by the reporting interval and expressed in `energy_units`. Only an hourly
/// cadence is supported; anything else (including an index too short to infer a cadence
/// from) is rejected.
pub fn rate_to_energy(
    table: &OutputSeriesTable,
    power_units: PowerUnit,
    energy_units: EnergyUnit,
) -> Result<OutputSeriesTable, BalanceError> {
    if table.is_empty() {
        return Ok(table.clone());
    }
    if !is_hourly(table.index()) {
        return Err(BalanceError::UnsupportedReportingFrequency(infer_cadence(
            table.index(),
        )));
    }
    let hour = Duration::from_secs(SECONDS_PER_HOUR);

    let mut converted = table.clone();
    for column in converted.columns_mut() {
        let reported = match ReportedUnit::from_str(&column.units)? {
            ReportedUnit::Power(unit) => unit,
            ReportedUnit::Energy(_) => {
                return Err(BalanceError::IncompatibleUnits {
                    from: column.units.clone(),
                    to: power_units.to_string(),
                })
            }
        };
        for value in column.values.iter_mut() {
            let rate = convert_power(*value, reported, power_units);
            *value = rate_over_duration(rate, power_units, hour, energy_units);
        }
        column.units = energy_units.to_string();
    }

    Ok(converted)
}
