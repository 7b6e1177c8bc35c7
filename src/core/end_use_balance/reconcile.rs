use crate::core::table::{Column, ColumnKey, OutputSeriesTable};
use crate::model::ModelContext;
use indexmap::IndexMap;
use tracing::warn;

/// Which part of a column key carries the " Gain" wording to drop once a gain and a loss
/// series have been netted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenameLevel {
    Variable,
    KeyValue,
}

impl RenameLevel {
    /// What a gain or loss column measures once `word` is dropped at this level, so that a gain
    /// column and its loss column share a pairing key.
    fn pairing_key(&self, key: &ColumnKey, word: &str) -> (String, String) {
        match self {
            RenameLevel::Variable => (key.variable.replace(word, ""), key.key_value.clone()),
            RenameLevel::KeyValue => (String::new(), key.key_value.replace(word, "")),
        }
    }

    fn strip(&self, key: &ColumnKey, word: &str) -> ColumnKey {
        let mut stripped = key.clone();
        match self {
            RenameLevel::Variable => stripped.variable = key.variable.replace(word, ""),
            RenameLevel::KeyValue => stripped.key_value = key.key_value.replace(word, ""),
        }
        stripped
    }
}

/// `gain - loss`, cell by cell, keyed like `gain` with " Gain" removed from `level`.
///
/// Each gain column is netted against the loss column measuring the same thing for the same
/// key, wherever it sits in `loss`. Returns `None` when the two tables do not share a row index
/// or do not pair up column for column.
pub fn subtract_loss_from_gain(
    gain: &OutputSeriesTable,
    loss: &OutputSeriesTable,
    level: RenameLevel,
) -> Option<OutputSeriesTable> {
    if gain.index() != loss.index() || gain.columns().len() != loss.columns().len() {
        return None;
    }
    let losses: IndexMap<(String, String), &Column> = loss
        .columns()
        .iter()
        .map(|column| (level.pairing_key(&column.key, " Loss"), column))
        .collect();
    if losses.len() != loss.columns().len() {
        return None;
    }

    let columns = gain
        .columns()
        .iter()
        .map(|column| {
            let loss = losses.get(&level.pairing_key(&column.key, " Gain"))?;
            Some(Column::new(
                level.strip(&column.key, " Gain"),
                column.units.clone(),
                column
                    .values
                    .iter()
                    .zip(loss.values.iter())
                    .map(|(gain, loss)| gain - loss)
                    .collect(),
            ))
        })
        .collect::<Option<Vec<_>>>()?;

    Some(OutputSeriesTable::new(gain.index().to_vec(), columns))
}

/// Per-zone heating delivered through radiant surfaces, net of radiant cooling.
///
/// A zone with only one of the two counts the other as zero; the result is empty only when
/// neither table has any series, or when the two are reported over different timestamps.
pub fn subtract_cooled_from_heated_surface(
    cooled: &OutputSeriesTable,
    heated: &OutputSeriesTable,
) -> OutputSeriesTable {
    let reference = match (heated.is_empty(), cooled.is_empty()) {
        (true, true) => return OutputSeriesTable::empty(),
        (false, _) => heated,
        (true, false) => cooled,
    };
    if !heated.is_empty() && !cooled.is_empty() && heated.index() != cooled.index() {
        warn!("Skipping radiant HVAC input: heated and cooled surface series do not line up");
        return OutputSeriesTable::empty();
    }
    let units = reference.columns()[0].units.clone();
    let rows = reference.index().len();

    let mut net = heated.sum_by(|key| key.key_value.clone());
    for (zone, cooling) in cooled.sum_by(|key| key.key_value.clone()) {
        let heating = net.entry(zone).or_insert_with(|| vec![0.; rows]);
        for (value, cooling) in heating.iter_mut().zip(cooling) {
            *value -= cooling;
        }
    }

    let columns = net
        .into_iter()
        .map(|(zone, values)| {
            Column::new(
                ColumnKey::new("Zone Radiant HVAC Energy", zone),
                units.clone(),
                values,
            )
        })
        .collect();

    OutputSeriesTable::new(reference.index().to_vec(), columns)
}

/// Net window conduction of each zone, with the transmitted solar gain of the same zone taken
/// out so that solar is only accounted for once.
pub fn subtract_solar_from_window_net(
    window_flow: &OutputSeriesTable,
    solar_gain: &OutputSeriesTable,
) -> OutputSeriesTable {
    if solar_gain.is_empty() || window_flow.index() != solar_gain.index() {
        return window_flow.clone();
    }
    let solar_by_zone = solar_gain.sum_by(|key| key.zone_name().to_uppercase());
    let mut net = window_flow.clone();
    for column in net.columns_mut() {
        if let Some(solar) = solar_by_zone.get(&column.key.zone_name().to_uppercase()) {
            for (value, solar) in column.values.iter_mut().zip(solar.iter()) {
                *value -= solar;
            }
        }
    }
    net
}

/// Scale zone-keyed series by the multiplier of the zone they were reported for.
pub fn apply_zone_multipliers(
    table: &OutputSeriesTable,
    context: &ModelContext,
) -> OutputSeriesTable {
    table.scale_columns(|key| context.zone_multiplier(&key.key_value) as f64)
}
