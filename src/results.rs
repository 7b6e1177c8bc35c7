use crate::core::table::{Column, ColumnKey, OutputSeriesTable};
use crate::core::units::{convert_energy, EnergyUnit};
use crate::simulation_time::ReportingFrequency;
use anyhow::anyhow;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::str::FromStr;

/// Read access to the time series produced by a completed simulation.
pub trait ResultStore {
    /// All series reported at `reporting_frequency` for any of `names`, one column per
    /// (name, key value) pair. Names with no reported series are simply absent from the
    /// result; a request matching nothing yields an empty table.
    fn collect_by_output_name(
        &self,
        names: &[&str],
        reporting_frequency: ReportingFrequency,
    ) -> anyhow::Result<OutputSeriesTable>;
}

/// Read access to the summary tables produced alongside the time series.
pub trait TabularReports {
    fn end_use_summary(&self) -> anyhow::Result<EndUseSummary>;
}

pub const END_USES: [&str; 14] = [
    "Heating",
    "Cooling",
    "Interior Lighting",
    "Exterior Lighting",
    "Interior Equipment",
    "Exterior Equipment",
    "Fans",
    "Pumps",
    "Heat Rejection",
    "Humidification",
    "Heat Recovery",
    "Water Systems",
    "Refrigeration",
    "Generators",
];

pub const ENERGY_SOURCES: [&str; 4] = [
    "Electricity",
    "Natural Gas",
    "District Cooling",
    "District Heating",
];

/// Annual building energy by end use and by energy source, as found in the annual building
/// utility performance summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndUseSummary {
    /// (end use, energy source) -> value in `units`
    values: IndexMap<(String, String), f64>,
    units: EnergyUnit,
    /// Net conditioned building area, in m2
    conditioned_floor_area: f64,
}

impl EndUseSummary {
    pub fn new(units: EnergyUnit, conditioned_floor_area: f64) -> Self {
        Self {
            values: Default::default(),
            units,
            conditioned_floor_area,
        }
    }

    /// Record a value for an end use and energy source. Categories outside the annual
    /// summary's end uses and energy sources are ignored.
    pub fn insert(&mut self, end_use: &str, energy_source: &str, value: f64) -> bool {
        if !END_USES.contains(&end_use) || !ENERGY_SOURCES.contains(&energy_source) {
            return false;
        }
        self.values
            .insert((end_use.to_string(), energy_source.to_string()), value);
        true
    }

    pub fn get(&self, end_use: &str, energy_source: &str) -> Option<f64> {
        self.values
            .get(&(end_use.to_string(), energy_source.to_string()))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.values
            .iter()
            .map(|((end_use, source), value)| (end_use.as_str(), source.as_str(), *value))
    }

    pub fn units(&self) -> EnergyUnit {
        self.units
    }

    pub fn conditioned_floor_area(&self) -> f64 {
        self.conditioned_floor_area
    }

    pub fn to_units(&self, units: EnergyUnit) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(key, value)| (key.clone(), convert_energy(*value, self.units, units)))
                .collect(),
            units,
            conditioned_floor_area: self.conditioned_floor_area,
        }
    }
}

/// One reported series as held by [`InMemoryResults`].
#[derive(Clone, Debug, PartialEq)]
pub struct ReportedSeries {
    pub name: String,
    pub key_value: String,
    pub units: String,
    pub reporting_frequency: ReportingFrequency,
    pub values: Vec<f64>,
}

/// A result store held entirely in memory, sharing one timestamp index per reporting
/// frequency.
#[derive(Clone, Debug, Default)]
pub struct InMemoryResults {
    indices: IndexMap<ReportingFrequency, Vec<NaiveDateTime>>,
    series: Vec<ReportedSeries>,
    end_uses: Option<EndUseSummary>,
}

impl InMemoryResults {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_index(
        mut self,
        reporting_frequency: ReportingFrequency,
        index: Vec<NaiveDateTime>,
    ) -> Self {
        self.indices.insert(reporting_frequency, index);
        self
    }

    pub fn with_end_uses(mut self, end_uses: EndUseSummary) -> Self {
        self.end_uses = Some(end_uses);
        self
    }

    pub fn set_end_uses(&mut self, end_uses: EndUseSummary) {
        self.end_uses = Some(end_uses);
    }

    pub fn index(&self, reporting_frequency: ReportingFrequency) -> Option<&[NaiveDateTime]> {
        self.indices
            .get(&reporting_frequency)
            .map(|index| index.as_slice())
    }

    /// Add a series, checking it has one value per timestamp of its reporting frequency.
    pub fn push(&mut self, series: ReportedSeries) -> anyhow::Result<()> {
        let index = self
            .indices
            .get(&series.reporting_frequency)
            .ok_or_else(|| {
                anyhow!(
                    "No timestamps were provided for reporting frequency '{}'",
                    series.reporting_frequency
                )
            })?;
        if index.len() != series.values.len() {
            return Err(anyhow!(
                "Series '{}' for '{}' has {} values but {} timestamps were reported",
                series.name,
                series.key_value,
                series.values.len(),
                index.len()
            ));
        }
        self.series.push(series);

        Ok(())
    }

    pub fn series(&self) -> &[ReportedSeries] {
        &self.series
    }
}

impl ResultStore for InMemoryResults {
    fn collect_by_output_name(
        &self,
        names: &[&str],
        reporting_frequency: ReportingFrequency,
    ) -> anyhow::Result<OutputSeriesTable> {
        let columns = self
            .series
            .iter()
            .filter(|series| {
                series.reporting_frequency == reporting_frequency
                    && names.contains(&series.name.as_str())
            })
            .map(|series| {
                Column::new(
                    ColumnKey::new(series.name.clone(), series.key_value.to_uppercase()),
                    series.units.clone(),
                    series.values.clone(),
                )
            })
            .collect::<Vec<_>>();
        if columns.is_empty() {
            return Ok(OutputSeriesTable::empty());
        }

        let index = self.indices[&reporting_frequency].clone();
        Ok(OutputSeriesTable::new(index, columns))
    }
}

impl TabularReports for InMemoryResults {
    fn end_use_summary(&self) -> anyhow::Result<EndUseSummary> {
        self.end_uses
            .clone()
            .ok_or_else(|| anyhow!("The results do not include an end use summary table"))
    }
}

impl FromStr for ReportedSeries {
    type Err = anyhow::Error;

    /// Parse the `KeyValue:Name [Units](Frequency)` header that EnergyPlus writes to its
    /// variable CSV files, e.g. `ZONE 1:Zone Lights Total Heating Energy [J](Hourly)`.
    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let header = header.trim();
        let (qualified_name, rest) = header
            .split_once('[')
            .ok_or_else(|| anyhow!("Output header '{header}' has no units"))?;
        let (key_value, name) = qualified_name
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("Output header '{header}' has no key value"))?;
        let (units, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("Output header '{header}' has unterminated units"))?;
        let frequency = rest
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| anyhow!("Output header '{header}' has no reporting frequency"))?;

        Ok(ReportedSeries {
            name: name.trim().to_string(),
            key_value: key_value.trim().to_string(),
            units: units.trim().to_string(),
            reporting_frequency: ReportingFrequency::from_str(frequency.trim())?,
            values: vec![],
        })
    }
}
