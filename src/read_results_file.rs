use crate::core::units::{convert_energy, EnergyUnit};
use crate::results::{EndUseSummary, InMemoryResults, ReportedSeries};
use crate::simulation_time::ReportingFrequency;
use anyhow::{anyhow, bail, Context};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use csv::ReaderBuilder as CsvReaderBuilder;
use indexmap::IndexMap;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;
use tracing::warn;

/// Reported timestamps carry no year; series are placed in this (non-leap) year.
pub const SIMULATION_YEAR: i32 = 2018;
const COLUMN_DATE_TIME: usize = 0;

/// Read a variable CSV as written by EnergyPlus' ReadVarsESO: a `Date/Time` column followed
/// by one column per series with a `KeyValue:Name [Units](Frequency)` header.
///
/// Hourly values are reported at the end of their interval and are moved to the start of it,
/// so the first hour of the year is stamped 00:00.
pub fn results_from_csv(file: impl Read) -> anyhow::Result<InMemoryResults> {
    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let mut series: IndexMap<usize, (ReportedSeries, Vec<NaiveDateTime>)> = IndexMap::new();
    for (i, header) in headers.iter().enumerate().skip(COLUMN_DATE_TIME + 1) {
        match ReportedSeries::from_str(header) {
            Ok(parsed) => {
                series.insert(i, (parsed, vec![]));
            }
            Err(err) => warn!("Ignoring column '{header}': {err}"),
        }
    }

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let Some(stamp) = record.get(COLUMN_DATE_TIME) else {
            continue;
        };
        let reported_at = parse_reported_timestamp(stamp)
            .with_context(|| format!("Could not read the timestamp on row {}", row + 1))?;

        for (i, (reported, timestamps)) in series.iter_mut() {
            let cell = record.get(*i).map(str::trim).unwrap_or_default();
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell.parse().with_context(|| {
                format!(
                    "Value '{cell}' of '{}' on row {} is not a number",
                    reported.name,
                    row + 1
                )
            })?;
            reported.values.push(value);
            timestamps.push(interval_start(reported_at, reported.reporting_frequency));
        }
    }

    let mut indices: IndexMap<ReportingFrequency, Vec<NaiveDateTime>> = IndexMap::new();
    for (reported, timestamps) in series.values() {
        match indices.get(&reported.reporting_frequency) {
            Some(index) if index != timestamps => bail!(
                "Series '{}' for '{}' is not reported at the same timestamps as the other {} series",
                reported.name,
                reported.key_value,
                reported.reporting_frequency
            ),
            Some(_) => {}
            None => {
                indices.insert(reported.reporting_frequency, timestamps.clone());
            }
        }
    }

    let mut results = indices
        .into_iter()
        .fold(InMemoryResults::new(), |results, (frequency, index)| {
            results.with_index(frequency, index)
        });
    for (reported, _) in series.into_values() {
        results.push(reported)?;
    }

    Ok(results)
}

/// Parse ` MM/DD  HH:MM:SS` (hour 1 to 24) or a date-only ` MM/DD`.
fn parse_reported_timestamp(stamp: &str) -> anyhow::Result<NaiveDateTime> {
    let mut parts = stamp.split_whitespace();
    let date = parts
        .next()
        .ok_or_else(|| anyhow!("Timestamp '{stamp}' is empty"))?;
    let (month, day) = date
        .split_once('/')
        .ok_or_else(|| anyhow!("Timestamp '{stamp}' does not start with a MM/DD date"))?;
    let date = NaiveDate::from_ymd_opt(SIMULATION_YEAR, month.parse()?, day.parse()?)
        .ok_or_else(|| anyhow!("Timestamp '{stamp}' is not a valid date"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Timestamp '{stamp}' is not a valid date"))?;

    let Some(time) = parts.next() else {
        return Ok(midnight);
    };
    let mut time_parts = time.split(':').map(str::parse::<i64>);
    let hours = time_parts.next().transpose()?.unwrap_or(0);
    let minutes = time_parts.next().transpose()?.unwrap_or(0);
    if !(0..=24).contains(&hours) || !(0..60).contains(&minutes) {
        bail!("Timestamp '{stamp}' has an out of range time of day");
    }

    Ok(midnight + TimeDelta::hours(hours) + TimeDelta::minutes(minutes))
}

fn interval_start(
    reported_at: NaiveDateTime,
    reporting_frequency: ReportingFrequency,
) -> NaiveDateTime {
    match reporting_frequency {
        ReportingFrequency::Hourly => reported_at - TimeDelta::hours(1),
        _ => reported_at,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EndUseRecord {
    end_use: String,
    energy_source: String,
    units: String,
    value: f64,
}

/// Read an end use summary from `EndUse,EnergySource,Units,Value` records.
///
/// Values are brought into a single energy unit (that of the first record); rows for end uses
/// or energy sources outside the annual summary are skipped.
pub fn end_uses_from_csv(
    file: impl Read,
    conditioned_floor_area: f64,
) -> anyhow::Result<EndUseSummary> {
    let mut reader = CsvReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut summary: Option<EndUseSummary> = None;

    for result in reader.deserialize() {
        let record: EndUseRecord = result?;
        let units = EnergyUnit::from_str(&record.units).map_err(|_| {
            anyhow!(
                "End use '{}' is reported in unknown units '{}'",
                record.end_use,
                record.units
            )
        })?;
        let summary =
            summary.get_or_insert_with(|| EndUseSummary::new(units, conditioned_floor_area));
        let value = convert_energy(record.value, units, summary.units());
        if !summary.insert(&record.end_use, &record.energy_source, value) {
            warn!(
                "Skipping end use '{}' / '{}' which is not part of the annual summary",
                record.end_use, record.energy_source
            );
        }
    }

    Ok(summary.unwrap_or_else(|| EndUseSummary::new(EnergyUnit::KWh, conditioned_floor_area)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{ResultStore, TabularReports};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    #[fixture]
    fn variable_csv() -> &'static str {
        "Date/Time,ZONE 1:Zone Lights Total Heating Energy [J](Hourly),ZONE 1:Zone Predicted Sensible Load to Setpoint Heat Transfer Rate [W](Hourly),Not a series\n\
          01/01  01:00:00,3600000,-12.5,x\n\
          01/01  02:00:00,7200000,0,y\n\
          01/01  24:00:00,0,40,z\n"
    }

    #[rstest]
    fn should_read_hourly_series(variable_csv: &str) {
        let results = results_from_csv(Cursor::new(variable_csv)).unwrap();

        assert_eq!(results.series().len(), 2);
        let index = results.index(ReportingFrequency::Hourly).unwrap();
        assert_eq!(
            index[0],
            NaiveDate::from_ymd_opt(2018, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(
            index[2],
            NaiveDate::from_ymd_opt(2018, 1, 1)
                .unwrap()
                .and_hms_opt(23, 0, 0)
                .unwrap()
        );

        let lighting = results
            .collect_by_output_name(
                &["Zone Lights Total Heating Energy"],
                ReportingFrequency::Hourly,
            )
            .unwrap();
        assert_eq!(lighting.columns()[0].values, vec![3_600_000., 7_200_000., 0.]);
        assert_eq!(lighting.columns()[0].units, "J");
    }

    #[rstest]
    fn should_reject_non_numeric_values() {
        let csv = "Date/Time,ZONE 1:Zone Lights Total Heating Energy [J](Hourly)\n 01/01  01:00:00,abc\n";
        assert!(results_from_csv(Cursor::new(csv)).is_err());
    }

    #[rstest]
    fn should_reject_unparseable_timestamps() {
        let csv = "Date/Time,ZONE 1:Zone Lights Total Heating Energy [J](Hourly)\nJanuary,1\n";
        assert!(results_from_csv(Cursor::new(csv)).is_err());
    }

    #[rstest]
    fn should_reject_series_with_gaps() {
        let csv = "Date/Time,ZONE 1:Zone Lights Total Heating Energy [J](Hourly),ZONE 2:Zone Lights Total Heating Energy [J](Hourly)\n\
                    01/01  01:00:00,1,1\n\
                    01/01  02:00:00,1,\n";
        assert!(results_from_csv(Cursor::new(csv)).is_err());
    }

    #[rstest]
    fn should_read_end_use_summary() {
        let csv = "EndUse,EnergySource,Units,Value\n\
                   Heating,Natural Gas,GJ,36\n\
                   Interior Lighting,Electricity,kWh,2500\n\
                   Total End Uses,Electricity,GJ,100\n";
        let summary = end_uses_from_csv(Cursor::new(csv), 250.).unwrap();
        let in_memory = InMemoryResults::new().with_end_uses(summary.clone());

        assert_eq!(summary.units(), EnergyUnit::GJ);
        assert_relative_eq!(summary.get("Heating", "Natural Gas").unwrap(), 36.);
        assert_relative_eq!(summary.get("Interior Lighting", "Electricity").unwrap(), 9.);
        assert_eq!(summary.get("Total End Uses", "Electricity"), None);
        assert_eq!(in_memory.end_use_summary().unwrap().conditioned_floor_area(), 250.);
    }
}
