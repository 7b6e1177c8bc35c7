use crate::core::units::{convert_energy, EnergyUnit, ReportedUnit};
use crate::errors::BalanceError;
use crate::model::{BoundaryCondition, SurfaceType};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::str::FromStr;
use tracing::warn;

/// Identifies one reported series: the output variable and the instance (zone, surface,
/// system) it was reported for. Surface-level series gain an attribution once they have
/// been matched to the zone that owns them.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColumnKey {
    pub variable: String,
    pub key_value: String,
    pub surface: Option<SurfaceAttribution>,
}

impl ColumnKey {
    pub fn new(variable: impl Into<String>, key_value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            key_value: key_value.into(),
            surface: None,
        }
    }

    pub fn with_surface(mut self, surface: SurfaceAttribution) -> Self {
        self.surface = Some(surface);
        self
    }

    /// The zone this column is accounted against.
    ///
    /// Zone-level series are keyed by the zone itself; attributed surface series carry the
    /// owning zone in their attribution.
    pub fn zone_name(&self) -> &str {
        match &self.surface {
            Some(surface) => &surface.zone_name,
            None => &self.key_value,
        }
    }
}

impl Display for ColumnKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key_value, self.variable)
    }
}

/// Where a surface (or the surface a window sits on) lives in the model.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SurfaceAttribution {
    /// Only set for windows: the building surface the window is on.
    pub building_surface_name: Option<String>,
    pub surface_type: SurfaceType,
    pub boundary_condition: Option<BoundaryCondition>,
    pub zone_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub key: ColumnKey,
    pub units: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(key: ColumnKey, units: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            key,
            units: units.into(),
            values,
        }
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// A time-indexed table of output series, one column per (variable, key) pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputSeriesTable {
    index: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl OutputSeriesTable {
    pub fn new(index: Vec<NaiveDateTime>, columns: Vec<Column>) -> Self {
        debug_assert!(
            columns.iter().all(|column| column.values.len() == index.len()),
            "every column should have one value per timestamp"
        );
        Self { index, columns }
    }

    pub fn empty() -> Self {
        Default::default()
    }

    /// A table is empty when it has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&Column> {
        self.columns.iter().find(|column| &column.key == key)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.key.variable.as_str())
    }

    /// Express every energy column in `units`.
    pub fn to_units(&self, units: EnergyUnit) -> Result<Self, BalanceError> {
        let mut converted = self.clone();
        for column in converted.columns.iter_mut() {
            match ReportedUnit::from_str(&column.units)? {
                ReportedUnit::Energy(from) => {
                    for value in column.values.iter_mut() {
                        *value = convert_energy(*value, from, units);
                    }
                    column.units = units.to_string();
                }
                ReportedUnit::Power(_) => {
                    return Err(BalanceError::IncompatibleUnits {
                        from: column.units.clone(),
                        to: units.to_string(),
                    })
                }
            }
        }

        Ok(converted)
    }

    /// Multiply each column by a factor chosen from its key.
    pub fn scale_columns(&self, factor: impl Fn(&ColumnKey) -> f64) -> Self {
        let mut scaled = self.clone();
        for column in scaled.columns.iter_mut() {
            let factor = factor(&column.key);
            column.values.iter_mut().for_each(|value| *value *= factor);
        }
        scaled
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        let mut mapped = self.clone();
        for column in mapped.columns.iter_mut() {
            column.values.iter_mut().for_each(|value| *value = f(*value));
        }
        mapped
    }

    /// Cellwise combination with an aligned table, keeping this table's columns.
    pub fn rename_variables(&self, rename: impl Fn(&str) -> String) -> Self {
        let mut renamed = self.clone();
        for column in renamed.columns.iter_mut() {
            column.key.variable = rename(&column.key.variable);
        }
        renamed
    }

    pub fn rename_key_values(&self, rename: impl Fn(&str) -> String) -> Self {
        let mut renamed = self.clone();
        for column in renamed.columns.iter_mut() {
            column.key.key_value = rename(&column.key.key_value);
        }
        renamed
    }

    pub fn retain_columns(&self, keep: impl Fn(&Column) -> bool) -> Self {
        Self {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .filter(|column| keep(column))
                .cloned()
                .collect(),
        }
    }

    /// Join tables side by side. Empty tables are ignored; a table whose index differs from
    /// the first non-empty one is skipped.
    pub fn concat(tables: impl IntoIterator<Item = OutputSeriesTable>) -> Self {
        let mut joined = OutputSeriesTable::empty();
        for table in tables.into_iter().filter(|table| !table.is_empty()) {
            if joined.is_empty() {
                joined = table;
            } else if joined.index == table.index {
                joined.columns.extend(table.columns);
            } else {
                warn!(
                    "Skipping {} column(s) whose timestamps do not match the other series",
                    table.columns.len()
                );
            }
        }
        joined
    }

    /// Sum columns sharing a group into one series per group, in order of first appearance.
    pub fn sum_by<K: Hash + Eq>(&self, group: impl Fn(&ColumnKey) -> K) -> IndexMap<K, Vec<f64>> {
        let mut sums: IndexMap<K, Vec<f64>> = IndexMap::new();
        for column in &self.columns {
            let sum = sums
                .entry(group(&column.key))
                .or_insert_with(|| vec![0.; self.index.len()]);
            for (total, value) in sum.iter_mut().zip(column.values.iter()) {
                *total += value;
            }
        }
        sums
    }

    /// Sum of every cell in the table.
    pub fn total(&self) -> f64 {
        self.columns.iter().map(Column::total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_time::hourly_index;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn lighting() -> OutputSeriesTable {
        OutputSeriesTable::new(
            hourly_index(2018, 3),
            vec![
                Column::new(
                    ColumnKey::new("Zone Lights Total Heating Energy", "ZONE 1"),
                    "J",
                    vec![3_600_000., 7_200_000., 0.],
                ),
                Column::new(
                    ColumnKey::new("Zone Lights Total Heating Energy", "ZONE 2"),
                    "J",
                    vec![0., 3_600_000., 3_600_000.],
                ),
            ],
        )
    }

    #[rstest]
    fn should_report_shape_and_emptiness(lighting: OutputSeriesTable) {
        assert_eq!(lighting.shape(), (3, 2));
        assert!(!lighting.is_empty());
        assert!(OutputSeriesTable::empty().is_empty());
        assert!(OutputSeriesTable::new(hourly_index(2018, 2), vec![]).is_empty());
    }

    #[rstest]
    fn should_convert_energy_units(lighting: OutputSeriesTable) {
        let converted = lighting.to_units(EnergyUnit::KWh).unwrap();
        assert_eq!(converted.columns()[0].values, vec![1., 2., 0.]);
        assert_eq!(converted.columns()[0].units, "kWh");
    }

    #[rstest]
    fn should_refuse_to_convert_rates_to_energy() {
        let rates = OutputSeriesTable::new(
            hourly_index(2018, 1),
            vec![Column::new(ColumnKey::new("Rate", "ZONE 1"), "W", vec![1.])],
        );
        assert!(rates.to_units(EnergyUnit::J).is_err());
    }

    #[rstest]
    fn should_sum_columns_by_group(lighting: OutputSeriesTable) {
        let sums = lighting.sum_by(|key| key.variable.clone());
        assert_eq!(
            sums["Zone Lights Total Heating Energy"],
            vec![3_600_000., 10_800_000., 3_600_000.]
        );
        assert_relative_eq!(lighting.total(), 18_000_000.);
    }

    #[rstest]
    fn should_concat_tables_skipping_empty_and_misaligned(lighting: OutputSeriesTable) {
        let misaligned = OutputSeriesTable::new(
            hourly_index(2019, 3),
            vec![Column::new(ColumnKey::new("Other", "ZONE 1"), "J", vec![1., 1., 1.])],
        );
        let joined = OutputSeriesTable::concat([
            OutputSeriesTable::empty(),
            lighting.clone(),
            misaligned,
            lighting.rename_variables(|_| "Copy".to_string()),
        ]);
        assert_eq!(joined.shape(), (3, 4));
    }

    #[rstest]
    fn should_scale_columns_by_key(lighting: OutputSeriesTable) {
        let scaled = lighting.scale_columns(|key| if key.key_value == "ZONE 2" { 3. } else { 1. });
        assert_eq!(scaled.columns()[0].values, lighting.columns()[0].values);
        assert_eq!(
            scaled.columns()[1].values,
            vec![0., 10_800_000., 10_800_000.]
        );
    }

    #[rstest]
    fn should_resolve_zone_from_attribution() {
        let key = ColumnKey::new("Surface Outside Face Conduction Heat Transfer Energy", "WALL 1")
            .with_surface(SurfaceAttribution {
                building_surface_name: None,
                surface_type: SurfaceType::Wall,
                boundary_condition: Some(BoundaryCondition::Outdoors),
                zone_name: "ZONE 1".to_string(),
            });
        assert_eq!(key.zone_name(), "ZONE 1");
        assert_eq!(ColumnKey::new("Zone Lights", "ZONE 2").zone_name(), "ZONE 2");
    }
}
