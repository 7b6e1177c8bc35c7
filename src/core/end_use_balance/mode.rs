use crate::core::table::OutputSeriesTable;
use indexmap::IndexMap;
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sign {
    Negative,
    Positive,
}

impl Sign {
    fn of(value: f64) -> Option<Self> {
        if value > 0. {
            Some(Sign::Positive)
        } else if value < 0. {
            Some(Sign::Negative)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Mode {
    Heating,
    Cooling,
}

impl From<Sign> for Mode {
    fn from(sign: Sign) -> Self {
        match sign {
            Sign::Positive => Mode::Heating,
            Sign::Negative => Mode::Cooling,
        }
    }
}

/// Fill each gap with the next known value.
fn back_fill<T: Copy>(values: &mut [Option<T>]) {
    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(known) => next = Some(*known),
            None => *value = next,
        }
    }
}

/// Fill each gap with the previous known value.
fn forward_fill<T: Copy>(values: &mut [Option<T>]) {
    let mut previous = None;
    for value in values.iter_mut() {
        match value {
            Some(known) => previous = Some(*known),
            None => *value = previous,
        }
    }
}

/// Resolve the sign of a net HVAC input series into a held heating/cooling sign per timestep.
///
/// Zeros take the sign of the nearest later non-zero sample, or failing that the nearest
/// earlier one. The sign is then sampled at each transition (the last sample of every run,
/// and always the final sample) and held constant back to the previous transition. A series
/// with no non-zero sample at all resolves to positive throughout.
pub fn rolling_sign_change(values: &[f64]) -> Vec<Sign> {
    let mut sign = values.iter().map(|value| Sign::of(*value)).collect::<Vec<_>>();
    back_fill(&mut sign);
    forward_fill(&mut sign);

    let mut rolling = (0..sign.len())
        .map(|i| {
            let is_transition = i + 1 == sign.len() || sign[i].is_none() || sign[i] != sign[i + 1];
            if is_transition {
                sign[i]
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    back_fill(&mut rolling);
    forward_fill(&mut rolling);

    rolling
        .into_iter()
        .map(|sign| sign.unwrap_or(Sign::Positive))
        .collect()
}

/// Heating or cooling mode of every zone at every timestep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModeTable {
    timesteps: usize,
    zones: IndexMap<String, Vec<Mode>>,
}

impl ModeTable {
    /// Build from the predicted sensible load to setpoint of each zone (positive = heating).
    /// Series reported more than once for a zone are summed.
    pub fn from_table(hvac_mode: &OutputSeriesTable) -> Self {
        let zones = hvac_mode
            .sum_by(|key| key.key_value.to_uppercase())
            .into_iter()
            .map(|(zone, load)| {
                let modes = rolling_sign_change(&load)
                    .into_iter()
                    .map(Mode::from)
                    .collect();
                (zone, modes)
            })
            .collect();

        Self {
            timesteps: hvac_mode.index().len(),
            zones,
        }
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Mode of `zone` at timestep `t`. Zones without a reported load are treated like a zone
    /// whose load was zero throughout, and so are heating.
    pub fn mode(&self, zone: &str, t: usize) -> Mode {
        self.zones
            .get(&zone.to_uppercase())
            .and_then(|modes| modes.get(t))
            .copied()
            .unwrap_or(Mode::Heating)
    }

    pub fn is_heating(&self, zone: &str, t: usize) -> bool {
        self.mode(zone, t) == Mode::Heating
    }

    pub fn is_cooling(&self, zone: &str, t: usize) -> bool {
        self.mode(zone, t) == Mode::Cooling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::{Column, ColumnKey};
    use crate::simulation_time::hourly_index;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use Sign::{Negative as N, Positive as P};

    #[rstest]
    #[case(vec![1., 2., -1., -3.], vec![P, P, N, N])]
    #[case(vec![0., 0., -1., 2.], vec![N, N, N, P])]
    #[case(vec![1., 0., 0., -1.], vec![P, N, N, N])]
    #[case(vec![-1., 0., 0.], vec![N, N, N])]
    #[case(vec![0., 5., 0.], vec![P, P, P])]
    #[case(vec![0., 0., 0.], vec![P, P, P])]
    #[case(vec![], vec![])]
    fn should_resolve_rolling_sign(#[case] values: Vec<f64>, #[case] expected: Vec<Sign>) {
        assert_eq!(rolling_sign_change(&values), expected);
    }

    #[fixture]
    fn hvac_mode() -> OutputSeriesTable {
        OutputSeriesTable::new(
            hourly_index(2018, 4),
            vec![
                Column::new(
                    ColumnKey::new(
                        "Zone Predicted Sensible Load to Setpoint Heat Transfer Rate",
                        "ZONE 1",
                    ),
                    "W",
                    vec![100., 0., -50., 0.],
                ),
                Column::new(
                    ColumnKey::new(
                        "Zone Predicted Sensible Load to Setpoint Heat Transfer Rate",
                        "ZONE 2",
                    ),
                    "W",
                    vec![0., 0., 0., 0.],
                ),
            ],
        )
    }

    #[rstest]
    fn should_classify_every_timestep_exactly_once(hvac_mode: OutputSeriesTable) {
        let modes = ModeTable::from_table(&hvac_mode);

        for zone in ["ZONE 1", "ZONE 2", "UNREPORTED ZONE"] {
            for t in 0..modes.timesteps() {
                assert_ne!(modes.is_heating(zone, t), modes.is_cooling(zone, t));
            }
        }
    }

    #[rstest]
    fn should_build_modes_per_zone(hvac_mode: OutputSeriesTable) {
        let modes = ModeTable::from_table(&hvac_mode);

        assert_eq!(
            (0..4).map(|t| modes.mode("zone 1", t)).collect::<Vec<_>>(),
            vec![Mode::Heating, Mode::Cooling, Mode::Cooling, Mode::Cooling]
        );
        assert!((0..4).all(|t| modes.is_heating("ZONE 2", t)));
        assert_eq!(modes.zones().collect::<Vec<_>>(), vec!["ZONE 1", "ZONE 2"]);
    }
}
