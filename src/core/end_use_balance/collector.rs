use crate::core::table::OutputSeriesTable;
use crate::core::units::EnergyUnit;
use crate::results::ResultStore;
use crate::simulation_time::ReportingFrequency;
use tracing::warn;

// positive = heating
pub const HVAC_MODE: [&str; 1] = ["Zone Predicted Sensible Load to Setpoint Heat Transfer Rate"];
// not multiplied by zone or group multipliers
pub const HVAC_INPUT_SENSIBLE: [&str; 2] = [
    "Zone Air Heat Balance System Air Transfer Rate",
    "Zone Air Heat Balance System Convective Heat Gain Rate",
];
pub const HVAC_INPUT_HEATED_SURFACE: [&str; 2] = [
    "Zone Radiant HVAC Heating Energy",
    "Zone Ventilated Slab Radiant Heating Energy",
];
pub const HVAC_INPUT_COOLED_SURFACE: [&str; 2] = [
    "Zone Radiant HVAC Cooling Energy",
    "Zone Ventilated Slab Radiant Cooling Energy",
];
pub const LIGHTING: [&str; 1] = ["Zone Lights Total Heating Energy"];
pub const ELECTRIC_EQUIPMENT: [&str; 6] = [
    "Zone Electric Equipment Radiant Heating Energy",
    "Zone Electric Equipment Convective Heating Energy",
    "Zone Steam Equipment Radiant Heating Energy",
    "Zone Steam Equipment Convective Heating Energy",
    "Zone Other Equipment Radiant Heating Energy",
    "Zone Other Equipment Convective Heating Energy",
];
pub const GAS_EQUIPMENT: [&str; 2] = [
    "Zone Gas Equipment Radiant Heating Energy",
    "Zone Gas Equipment Convective Heating Energy",
];
pub const HOT_WATER_EQUIPMENT: [&str; 2] = [
    "Zone Hot Water Equipment Radiant Heating Energy",
    "Zone Hot Water Equipment Convective Heating Energy",
];
pub const PEOPLE_GAIN: [&str; 1] = ["Zone People Total Heating Energy"];
pub const SOLAR_GAIN: [&str; 1] = ["Zone Windows Total Transmitted Solar Radiation Energy"];
pub const INFILTRATION_GAIN: [&str; 2] = [
    "Zone Infiltration Total Heat Gain Energy",
    "AFN Zone Infiltration Total Heat Gain Energy",
];
pub const INFILTRATION_LOSS: [&str; 2] = [
    "Zone Infiltration Total Heat Loss Energy",
    "AFN Zone Infiltration Total Heat Loss Energy",
];
pub const VENTILATION_LOSS: [&str; 1] = ["Zone Air System Total Heating Energy"];
pub const VENTILATION_GAIN: [&str; 1] = ["Zone Air System Total Cooling Energy"];
pub const NATURAL_VENTILATION_GAIN: [&str; 2] = [
    "Zone Ventilation Total Heat Gain Energy",
    "AFN Zone Ventilation Total Heat Gain Energy",
];
pub const NATURAL_VENTILATION_LOSS: [&str; 2] = [
    "Zone Ventilation Total Heat Loss Energy",
    "AFN Zone Ventilation Total Heat Loss Energy",
];
pub const OPAQUE_ENERGY_FLOW: [&str; 1] = ["Surface Outside Face Conduction Heat Transfer Energy"];
pub const OPAQUE_ENERGY_STORAGE: [&str; 1] = ["Surface Heat Storage Energy"];
pub const WINDOW_LOSS: [&str; 1] = ["Zone Windows Total Heat Loss Energy"];
pub const WINDOW_GAIN: [&str; 1] = ["Zone Windows Total Heat Gain Energy"];
pub const SURFACE_WINDOW_LOSS: [&str; 1] = ["Surface Window Heat Loss Energy"];
pub const SURFACE_WINDOW_GAIN: [&str; 1] = ["Surface Window Heat Gain Energy"];
pub const HEAT_RECOVERY_LOSS: [&str; 1] = ["Heat Exchanger Total Cooling Energy"];
pub const HEAT_RECOVERY_GAIN: [&str; 1] = ["Heat Exchanger Total Heating Energy"];
pub const AIR_SYSTEM_HEATING_COIL: &str = "Air System Heating Coil Total Heating Energy";
pub const AIR_SYSTEM_COOLING_COIL: &str = "Air System Cooling Coil Total Cooling Energy";
pub const AIR_SYSTEM: [&str; 2] = [AIR_SYSTEM_HEATING_COIL, AIR_SYSTEM_COOLING_COIL];

/// Fetches named output series from a result store at one reporting frequency, tolerating
/// series that were never reported.
pub struct TimeSeriesCollector<'a, S: ResultStore> {
    store: &'a S,
    reporting_frequency: ReportingFrequency,
}

impl<'a, S: ResultStore> TimeSeriesCollector<'a, S> {
    pub fn new(store: &'a S, reporting_frequency: ReportingFrequency) -> Self {
        Self {
            store,
            reporting_frequency,
        }
    }

    pub fn reporting_frequency(&self) -> ReportingFrequency {
        self.reporting_frequency
    }

    /// Every reported series for any of `names`, in their reported units. Names that were not
    /// reported are logged and left out.
    pub fn collect(&self, names: &[&str]) -> anyhow::Result<OutputSeriesTable> {
        let table = self
            .store
            .collect_by_output_name(names, self.reporting_frequency)?;

        for name in names {
            if !table.variables().any(|variable| variable == *name) {
                warn!(
                    "No {} series were reported for '{name}'",
                    self.reporting_frequency
                );
            }
        }
        if table.is_empty() {
            return Ok(OutputSeriesTable::empty());
        }

        Ok(table)
    }

    /// As [`collect`](Self::collect), with every series converted to `units`.
    pub fn collect_energy(
        &self,
        names: &[&str],
        units: EnergyUnit,
    ) -> anyhow::Result<OutputSeriesTable> {
        Ok(self.collect(names)?.to_units(units)?)
    }
}
