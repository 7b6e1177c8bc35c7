use crate::core::end_use_balance::attribution::{
    drop_interior_surfaces, match_opaque_surface_to_zone, match_window_to_zone,
};
use crate::core::end_use_balance::collector::{
    TimeSeriesCollector, AIR_SYSTEM, AIR_SYSTEM_COOLING_COIL, AIR_SYSTEM_HEATING_COIL,
    ELECTRIC_EQUIPMENT, GAS_EQUIPMENT, HEAT_RECOVERY_GAIN, HEAT_RECOVERY_LOSS,
    HOT_WATER_EQUIPMENT, HVAC_INPUT_COOLED_SURFACE, HVAC_INPUT_HEATED_SURFACE,
    HVAC_INPUT_SENSIBLE, HVAC_MODE, INFILTRATION_GAIN, INFILTRATION_LOSS, LIGHTING,
    NATURAL_VENTILATION_GAIN, NATURAL_VENTILATION_LOSS, OPAQUE_ENERGY_FLOW,
    OPAQUE_ENERGY_STORAGE, PEOPLE_GAIN, SOLAR_GAIN, SURFACE_WINDOW_GAIN, SURFACE_WINDOW_LOSS,
    VENTILATION_GAIN, VENTILATION_LOSS, WINDOW_GAIN, WINDOW_LOSS,
};
use crate::core::end_use_balance::mode::{Mode, ModeTable};
use crate::core::end_use_balance::reconcile::{
    apply_zone_multipliers, subtract_cooled_from_heated_surface, subtract_loss_from_gain,
    subtract_solar_from_window_net, RenameLevel,
};
use crate::core::end_use_balance::sankey::{sankey_flows, write_sankey_flows, SankeyFlow};
use crate::core::table::{Column, ColumnKey, OutputSeriesTable};
use crate::core::units::{rate_to_energy, EnergyUnit, PowerUnit};
use crate::errors::BalanceError;
use crate::model::ModelContext;
use crate::output::Output;
use crate::results::{ResultStore, TabularReports};
use crate::simulation_time::ReportingFrequency;
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::io::{Read, Write};
use strum_macros::Display;
use tracing::{debug, warn};

pub const MECHANICAL_VENTILATION: &str = "Zone Mechanical Ventilation Energy";
pub const FACE_ENERGY_FLOW: &str = "Surface Face Energy Flow";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Every energy category the balance keeps a table for.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Component {
    Cooling,
    Heating,
    Lighting,
    #[strum(serialize = "Electric Equipment")]
    ElectricEquipment,
    #[strum(serialize = "Gas Equipment")]
    GasEquipment,
    #[strum(serialize = "Hot Water")]
    HotWater,
    #[strum(serialize = "People Gain")]
    PeopleGain,
    #[strum(serialize = "Solar Gain")]
    SolarGain,
    Infiltration,
    #[strum(serialize = "Mechanical Ventilation")]
    MechanicalVentilation,
    #[strum(serialize = "Natural Ventilation")]
    NaturalVentilation,
    #[strum(serialize = "Window Conduction")]
    WindowConduction,
    #[strum(serialize = "Opaque Conduction")]
    OpaqueConduction,
    #[strum(serialize = "Opaque Storage")]
    OpaqueStorage,
    #[strum(serialize = "Window Surface Flow")]
    WindowSurfaceFlow,
    #[strum(serialize = "Heat Recovery")]
    HeatRecovery,
    #[strum(serialize = "Air System")]
    AirSystem,
}

/// Zone-keyed components reported by [`EndUseBalance::to_df`], in column order.
const TABULATED_COMPONENTS: [Component; 12] = [
    Component::Cooling,
    Component::Heating,
    Component::Lighting,
    Component::ElectricEquipment,
    Component::GasEquipment,
    Component::HotWater,
    Component::PeopleGain,
    Component::SolarGain,
    Component::Infiltration,
    Component::WindowConduction,
    Component::NaturalVentilation,
    Component::MechanicalVentilation,
];

/// Rows of [`EndUseBalance::component_summary`].
const SUMMARY_ROWS: [(&str, Component, GroupLevel); 6] = [
    ("Opaque Conduction", Component::OpaqueConduction, GroupLevel::ZoneName),
    ("Window Conduction", Component::WindowConduction, GroupLevel::ZoneName),
    ("Window Solar Gains", Component::SolarGain, GroupLevel::KeyValue),
    ("Lighting", Component::Lighting, GroupLevel::KeyValue),
    ("Infiltration", Component::Infiltration, GroupLevel::KeyValue),
    (
        "Occupants (Sensible + Latent)",
        Component::PeopleGain,
        GroupLevel::KeyValue,
    ),
];

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Period {
    #[strum(serialize = "Cooling Periods")]
    Cooling,
    #[strum(serialize = "Heating Periods")]
    Heating,
}

impl From<Mode> for Period {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Heating => Period::Heating,
            Mode::Cooling => Period::Cooling,
        }
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum HeatFlow {
    #[strum(serialize = "Heat Gain")]
    Gain,
    #[strum(serialize = "Heat Loss")]
    Loss,
}

impl HeatFlow {
    fn of(value: f64) -> Self {
        if value >= 0. {
            HeatFlow::Gain
        } else {
            HeatFlow::Loss
        }
    }
}

/// The four cells of the period by gain/loss decomposition, in column order.
pub const PERIOD_FLOWS: [(Period, HeatFlow); 4] = [
    (Period::Cooling, HeatFlow::Gain),
    (Period::Cooling, HeatFlow::Loss),
    (Period::Heating, HeatFlow::Gain),
    (Period::Heating, HeatFlow::Loss),
];

/// Which part of a column key the decomposition groups columns by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupLevel {
    KeyValue,
    /// The zone a column is accounted against, through its surface attribution if it has one.
    ZoneName,
    /// Surface type of attributed columns; columns without an attribution group by key value.
    SurfaceType,
}

impl GroupLevel {
    fn group(&self, key: &ColumnKey) -> String {
        match self {
            GroupLevel::KeyValue => key.key_value.clone(),
            GroupLevel::ZoneName => key.zone_name().to_string(),
            GroupLevel::SurfaceType => surface_type_of(key),
        }
    }
}

fn surface_type_of(key: &ColumnKey) -> String {
    key.surface
        .as_ref()
        .map(|surface| surface.surface_type.to_string())
        .unwrap_or_else(|| key.key_value.clone())
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct BalanceConfig {
    /// Energy unit every component is expressed in.
    pub units: EnergyUnit,
    /// Power unit HVAC rates are brought into before they are integrated over each timestep.
    pub power_units: PowerUnit,
    /// Whether to drop interior partitions and surfaces with an unknown boundary condition
    /// from the opaque conduction.
    pub outdoor_surfaces_only: bool,
    pub reporting_frequency: ReportingFrequency,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            units: EnergyUnit::KWh,
            power_units: PowerUnit::KW,
            outdoor_surfaces_only: true,
            reporting_frequency: ReportingFrequency::Hourly,
        }
    }
}

impl BalanceConfig {
    pub fn from_reader(json: impl Read) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(json)?)
    }
}

/// Sums of a decomposed component over time and space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FlowTotals {
    pub cooling_gain: f64,
    pub cooling_loss: f64,
    pub heating_gain: f64,
    pub heating_loss: f64,
}

impl FlowTotals {
    pub fn get(&self, period: Period, flow: HeatFlow) -> f64 {
        match (period, flow) {
            (Period::Cooling, HeatFlow::Gain) => self.cooling_gain,
            (Period::Cooling, HeatFlow::Loss) => self.cooling_loss,
            (Period::Heating, HeatFlow::Gain) => self.heating_gain,
            (Period::Heating, HeatFlow::Loss) => self.heating_loss,
        }
    }

    fn add(&mut self, period: Period, flow: HeatFlow, value: f64) {
        let total = match (period, flow) {
            (Period::Cooling, HeatFlow::Gain) => &mut self.cooling_gain,
            (Period::Cooling, HeatFlow::Loss) => &mut self.cooling_loss,
            (Period::Heating, HeatFlow::Gain) => &mut self.heating_gain,
            (Period::Heating, HeatFlow::Loss) => &mut self.heating_loss,
        };
        *total += value;
    }

    pub fn total(&self) -> f64 {
        self.cooling_gain + self.cooling_loss + self.heating_gain + self.heating_loss
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DecomposedKey {
    pub group: String,
    pub period: Period,
    pub flow: HeatFlow,
}

/// A component split into heating and cooling periods and into gains and losses.
///
/// Every group has all four (period, gain/loss) columns. A cell outside its period or of the
/// other sign is zero; losses keep their negative sign.
#[derive(Clone, Debug, PartialEq)]
pub struct DecomposedTable {
    index: Vec<NaiveDateTime>,
    columns: IndexMap<DecomposedKey, Vec<f64>>,
}

impl DecomposedTable {
    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn get(&self, group: &str, period: Period, flow: HeatFlow) -> Option<&[f64]> {
        self.columns
            .get(&DecomposedKey {
                group: group.to_string(),
                period,
                flow,
            })
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DecomposedKey, &[f64])> {
        self.columns
            .iter()
            .map(|(key, values)| (key, values.as_slice()))
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.columns
            .keys()
            .filter(|key| (key.period, key.flow) == PERIOD_FLOWS[0])
            .map(|key| key.group.as_str())
    }

    /// Sum over time and every group.
    pub fn totals(&self) -> FlowTotals {
        let mut totals = FlowTotals::default();
        for (key, values) in &self.columns {
            totals.add(key.period, key.flow, values.iter().sum());
        }
        totals
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BalanceKey {
    pub component: String,
    pub zone: String,
    pub flow: Option<(Period, HeatFlow)>,
}

/// Every component of a balance side by side, one column per component and zone (and per
/// period and gain/loss when decomposed).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BalanceTable {
    index: Vec<NaiveDateTime>,
    units: EnergyUnit,
    columns: IndexMap<BalanceKey, Vec<f64>>,
}

impl BalanceTable {
    fn new(units: EnergyUnit) -> Self {
        Self {
            index: vec![],
            units,
            columns: Default::default(),
        }
    }

    /// Add the columns of a table reported over `index`. Columns over a different index than
    /// the one already held are skipped.
    fn extend(
        &mut self,
        index: &[NaiveDateTime],
        columns: impl IntoIterator<Item = (BalanceKey, Vec<f64>)>,
    ) {
        if self.columns.is_empty() {
            self.index = index.to_vec();
        } else if self.index != index {
            warn!("Skipping columns whose timestamps do not match the rest of the balance");
            return;
        }
        for (key, values) in columns {
            let column = self
                .columns
                .entry(key)
                .or_insert_with(|| vec![0.; index.len()]);
            for (total, value) in column.iter_mut().zip(values) {
                *total += value;
            }
        }
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn units(&self) -> EnergyUnit {
        self.units
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn get(&self, key: &BalanceKey) -> Option<&[f64]> {
        self.columns.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &BalanceKey> {
        self.columns.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BalanceKey, &[f64])> {
        self.columns
            .iter()
            .map(|(key, values)| (key, values.as_slice()))
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.columns
            .keys()
            .map(|key| key.component.as_str())
            .unique()
    }

    pub fn total(&self) -> f64 {
        self.columns.values().flatten().sum()
    }

    /// Sum over time and zones of every decomposed column, by component, period and
    /// gain/loss.
    pub fn annual_by_component(&self) -> IndexMap<(String, Period, HeatFlow), f64> {
        let mut annual = IndexMap::new();
        for (key, values) in &self.columns {
            let Some((period, flow)) = key.flow else {
                continue;
            };
            *annual
                .entry((key.component.clone(), period, flow))
                .or_insert(0.) += values.iter().sum::<f64>();
        }
        annual
    }

    /// Write as CSV: one header row per key level, then a units row, then a row per timestamp.
    pub fn write_csv(&self, writer: impl Write) -> anyhow::Result<()> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

        let mut component_row = vec!["Component".to_string()];
        let mut zone_row = vec!["Zone".to_string()];
        let mut period_row = vec!["Period".to_string()];
        let mut flow_row = vec!["Gain/Loss".to_string()];
        let mut units_row = vec!["[Timestamp]".to_string()];
        for key in self.columns.keys() {
            component_row.push(key.component.clone());
            zone_row.push(key.zone.clone());
            let (period, flow) = match key.flow {
                Some((period, flow)) => (period.to_string(), flow.to_string()),
                None => Default::default(),
            };
            period_row.push(period);
            flow_row.push(flow);
            units_row.push(format!("[{}]", self.units));
        }

        writer.write_record(&component_row)?;
        writer.write_record(&zone_row)?;
        if self.columns.keys().any(|key| key.flow.is_some()) {
            writer.write_record(&period_row)?;
            writer.write_record(&flow_row)?;
        }
        writer.write_record(&units_row)?;

        for (t, timestamp) in self.index.iter().enumerate() {
            let mut row = vec![timestamp.format(TIMESTAMP_FORMAT).to_string()];
            row.extend(self.columns.values().map(|values| values[t].to_string()));
            writer.write_record(&row)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// The annual roll-up of the main heat transfer phenomena, one row per phenomenon.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentSummary {
    units: EnergyUnit,
    rows: IndexMap<String, FlowTotals>,
}

impl ComponentSummary {
    pub fn units(&self) -> EnergyUnit {
        self.units
    }

    pub fn get(&self, phenomenon: &str) -> Option<&FlowTotals> {
        self.rows.get(phenomenon)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlowTotals)> {
        self.rows.iter().map(|(name, totals)| (name.as_str(), totals))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.rows.values().map(FlowTotals::total).sum()
    }

    pub fn write_csv(&self, writer: impl Write) -> anyhow::Result<()> {
        let mut writer = WriterBuilder::new().from_writer(writer);

        let mut headings = vec!["Component".to_string()];
        headings.extend(
            PERIOD_FLOWS
                .iter()
                .map(|(period, flow)| format!("{period} {flow} [{}]", self.units)),
        );
        writer.write_record(&headings)?;

        for (name, totals) in &self.rows {
            let mut row = vec![name.clone()];
            row.extend(
                PERIOD_FLOWS
                    .iter()
                    .map(|(period, flow)| totals.get(*period, *flow).to_string()),
            );
            writer.write_record(&row)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Reconciled energy flows of a building, by component, in one energy unit.
#[derive(Clone, Debug)]
pub struct EndUseBalance {
    cooling: Option<OutputSeriesTable>,
    heating: Option<OutputSeriesTable>,
    lighting: Option<OutputSeriesTable>,
    electric_equipment: Option<OutputSeriesTable>,
    gas_equipment: Option<OutputSeriesTable>,
    hot_water: Option<OutputSeriesTable>,
    people_gain: Option<OutputSeriesTable>,
    solar_gain: Option<OutputSeriesTable>,
    infiltration: Option<OutputSeriesTable>,
    mechanical_ventilation: Option<OutputSeriesTable>,
    natural_ventilation: Option<OutputSeriesTable>,
    window_conduction: Option<OutputSeriesTable>,
    opaque_conduction: Option<OutputSeriesTable>,
    opaque_storage: Option<OutputSeriesTable>,
    window_surface_flow: Option<OutputSeriesTable>,
    heat_recovery: Option<OutputSeriesTable>,
    air_system: Option<OutputSeriesTable>,
    modes: ModeTable,
    units: EnergyUnit,
}

impl EndUseBalance {
    /// Collect and reconcile every component from the results of a completed simulation.
    ///
    /// Missing outputs leave their component empty; paired gain/loss outputs that do not line
    /// up leave it unset. The only failures are a store error, an HVAC rate reported at a
    /// cadence other than hourly, and a unit that cannot be converted.
    pub fn from_results<S: ResultStore>(
        store: &S,
        context: &ModelContext,
        config: &BalanceConfig,
    ) -> anyhow::Result<Self> {
        let collector = TimeSeriesCollector::new(store, config.reporting_frequency);
        let units = config.units;
        let zone_level = |names: &[&str]| -> anyhow::Result<OutputSeriesTable> {
            Ok(apply_zone_multipliers(
                &collector.collect_energy(names, units)?,
                context,
            ))
        };

        let hvac_input = rate_to_energy(
            &collector.collect(&HVAC_INPUT_SENSIBLE)?,
            config.power_units,
            units,
        )?;
        let radiant_input = subtract_cooled_from_heated_surface(
            &collector.collect_energy(&HVAC_INPUT_COOLED_SURFACE, units)?,
            &collector.collect_energy(&HVAC_INPUT_HEATED_SURFACE, units)?,
        );
        let hvac_input = OutputSeriesTable::concat([hvac_input, radiant_input]);

        let modes = ModeTable::from_table(&collector.collect(&HVAC_MODE)?);
        let heating = mask_by_mode(&hvac_input, &modes, Mode::Heating);
        let cooling = mask_by_mode(&hvac_input, &modes, Mode::Cooling);

        let lighting = zone_level(&LIGHTING)?;
        let electric_equipment = zone_level(&ELECTRIC_EQUIPMENT)?;
        let gas_equipment = zone_level(&GAS_EQUIPMENT)?;
        let hot_water = zone_level(&HOT_WATER_EQUIPMENT)?;
        let people_gain = zone_level(&PEOPLE_GAIN)?;
        let solar_gain = zone_level(&SOLAR_GAIN)?;

        let infiltration = reconcile_pair(
            Component::Infiltration,
            &zone_level(&INFILTRATION_GAIN)?,
            &zone_level(&INFILTRATION_LOSS)?,
            RenameLevel::Variable,
        );
        let natural_ventilation = reconcile_pair(
            Component::NaturalVentilation,
            &zone_level(&NATURAL_VENTILATION_GAIN)?,
            &zone_level(&NATURAL_VENTILATION_LOSS)?,
            RenameLevel::Variable,
        );
        let heat_recovery = reconcile_pair(
            Component::HeatRecovery,
            &collector.collect_energy(&HEAT_RECOVERY_GAIN, units)?,
            &collector.collect_energy(&HEAT_RECOVERY_LOSS, units)?,
            RenameLevel::KeyValue,
        );
        let mechanical_ventilation = net_mechanical_ventilation(
            &zone_level(&VENTILATION_GAIN)?,
            &zone_level(&VENTILATION_LOSS)?,
            &heating,
            &cooling,
        );

        let window_conduction = reconcile_pair(
            Component::WindowConduction,
            &zone_level(&WINDOW_GAIN)?,
            &zone_level(&WINDOW_LOSS)?,
            RenameLevel::Variable,
        )
        .map(|window_flow| subtract_solar_from_window_net(&window_flow, &solar_gain));

        let opaque_flow = collector.collect_energy(&OPAQUE_ENERGY_FLOW, units)?;
        let opaque_storage = collector.collect_energy(&OPAQUE_ENERGY_STORAGE, units)?;
        let mut opaque_conduction = match_opaque_surface_to_zone(
            &net_opaque_conduction(&opaque_flow, &opaque_storage),
            context,
        );
        let mut opaque_storage = match_opaque_surface_to_zone(&opaque_storage, context);
        if config.outdoor_surfaces_only {
            opaque_conduction = drop_interior_surfaces(&opaque_conduction);
            opaque_storage = drop_interior_surfaces(&opaque_storage);
        }

        let window_surface_flow = reconcile_pair(
            Component::WindowSurfaceFlow,
            &collector.collect_energy(&SURFACE_WINDOW_GAIN, units)?,
            &collector.collect_energy(&SURFACE_WINDOW_LOSS, units)?,
            RenameLevel::Variable,
        )
        .map(|window_flow| match_window_to_zone(&window_flow, context));

        let air_system = collector.collect_energy(&AIR_SYSTEM, units)?;

        Ok(Self {
            cooling: Some(cooling),
            heating: Some(heating),
            lighting: Some(lighting),
            electric_equipment: Some(electric_equipment),
            gas_equipment: Some(gas_equipment),
            hot_water: Some(hot_water),
            people_gain: Some(people_gain),
            solar_gain: Some(solar_gain),
            infiltration,
            mechanical_ventilation,
            natural_ventilation,
            window_conduction,
            opaque_conduction: Some(opaque_conduction),
            opaque_storage: Some(opaque_storage),
            window_surface_flow,
            heat_recovery,
            air_system: Some(air_system),
            modes,
            units,
        })
    }

    pub fn units(&self) -> EnergyUnit {
        self.units
    }

    pub fn modes(&self) -> &ModeTable {
        &self.modes
    }

    pub fn component(&self, kind: Component) -> Option<&OutputSeriesTable> {
        match kind {
            Component::Cooling => self.cooling.as_ref(),
            Component::Heating => self.heating.as_ref(),
            Component::Lighting => self.lighting.as_ref(),
            Component::ElectricEquipment => self.electric_equipment.as_ref(),
            Component::GasEquipment => self.gas_equipment.as_ref(),
            Component::HotWater => self.hot_water.as_ref(),
            Component::PeopleGain => self.people_gain.as_ref(),
            Component::SolarGain => self.solar_gain.as_ref(),
            Component::Infiltration => self.infiltration.as_ref(),
            Component::MechanicalVentilation => self.mechanical_ventilation.as_ref(),
            Component::NaturalVentilation => self.natural_ventilation.as_ref(),
            Component::WindowConduction => self.window_conduction.as_ref(),
            Component::OpaqueConduction => self.opaque_conduction.as_ref(),
            Component::OpaqueStorage => self.opaque_storage.as_ref(),
            Component::WindowSurfaceFlow => self.window_surface_flow.as_ref(),
            Component::HeatRecovery => self.heat_recovery.as_ref(),
            Component::AirSystem => self.air_system.as_ref(),
        }
    }

    /// Split a component by the mode of the zone each cell belongs to and by the sign of the
    /// cell (zero counts as a gain), grouping columns at `level`.
    pub fn separate_gains_and_losses(
        &self,
        kind: Component,
        level: GroupLevel,
    ) -> Result<DecomposedTable, BalanceError> {
        let table = self
            .component(kind)
            .filter(|table| !table.is_empty())
            .ok_or(BalanceError::EmptyComponent(kind))?;

        let columns = self
            .split_by_mode(table, |key| level.group(key))
            .into_iter()
            .map(|((group, period, flow), values)| {
                (
                    DecomposedKey {
                        group,
                        period,
                        flow,
                    },
                    values,
                )
            })
            .collect();

        Ok(DecomposedTable {
            index: table.index().to_vec(),
            columns,
        })
    }

    fn split_by_mode<K: Clone + Eq + Hash>(
        &self,
        table: &OutputSeriesTable,
        group: impl Fn(&ColumnKey) -> K,
    ) -> IndexMap<(K, Period, HeatFlow), Vec<f64>> {
        let rows = table.index().len();
        let mut split = IndexMap::new();
        for column in table.columns() {
            let key = group(&column.key);
            for (period, flow) in PERIOD_FLOWS {
                split
                    .entry((key.clone(), period, flow))
                    .or_insert_with(|| vec![0.; rows]);
            }
            let zone = column.key.zone_name();
            for (t, value) in column.values.iter().enumerate() {
                let period = Period::from(self.modes.mode(zone, t));
                split[&(key.clone(), period, HeatFlow::of(*value))][t] += value;
            }
        }
        split
    }

    /// Every non-empty component side by side, summed per zone; opaque conduction is split
    /// by surface type and air system coil energy is always keyed by its period and flow.
    pub fn to_df(&self, separate_gains_and_losses: bool) -> BalanceTable {
        let mut balance = BalanceTable::new(self.units);

        for kind in TABULATED_COMPONENTS {
            let Some(table) = self.component(kind).filter(|table| !table.is_empty()) else {
                debug!("Leaving empty component {kind} out of the balance");
                continue;
            };
            let label = kind.to_string();
            if separate_gains_and_losses {
                let split = self.split_by_mode(table, |key| key.key_value.clone());
                balance.extend(
                    table.index(),
                    split.into_iter().map(|((zone, period, flow), values)| {
                        (
                            BalanceKey {
                                component: label.clone(),
                                zone,
                                flow: Some((period, flow)),
                            },
                            values,
                        )
                    }),
                );
            } else {
                let by_zone = table.sum_by(|key| key.key_value.clone());
                balance.extend(
                    table.index(),
                    by_zone.into_iter().map(|(zone, values)| {
                        (
                            BalanceKey {
                                component: label.clone(),
                                zone,
                                flow: None,
                            },
                            values,
                        )
                    }),
                );
            }
        }

        if let Some(opaque) = self
            .opaque_conduction
            .as_ref()
            .filter(|table| !table.is_empty())
        {
            let by_surface_type = |key: &ColumnKey| (surface_type_of(key), key.zone_name().to_string());
            if separate_gains_and_losses {
                let split = self.split_by_mode(opaque, by_surface_type);
                balance.extend(
                    opaque.index(),
                    split
                        .into_iter()
                        .map(|(((surface_type, zone), period, flow), values)| {
                            (
                                BalanceKey {
                                    component: surface_type,
                                    zone,
                                    flow: Some((period, flow)),
                                },
                                values,
                            )
                        }),
                );
            } else {
                balance.extend(
                    opaque.index(),
                    opaque
                        .sum_by(by_surface_type)
                        .into_iter()
                        .map(|((surface_type, zone), values)| {
                            (
                                BalanceKey {
                                    component: surface_type,
                                    zone,
                                    flow: None,
                                },
                                values,
                            )
                        }),
                );
            }
        }

        if let Some(air_system) = self.air_system.as_ref().filter(|table| !table.is_empty()) {
            let coils = air_system.columns().iter().filter_map(|column| {
                let (component, period, flow) = match column.key.variable.as_str() {
                    AIR_SYSTEM_HEATING_COIL => ("OA Heating", Period::Heating, HeatFlow::Loss),
                    AIR_SYSTEM_COOLING_COIL => ("OA Cooling", Period::Cooling, HeatFlow::Gain),
                    _ => return None,
                };
                Some((
                    BalanceKey {
                        component: component.to_string(),
                        zone: column.key.key_value.clone(),
                        flow: Some((period, flow)),
                    },
                    column.values.clone(),
                ))
            });
            balance.extend(air_system.index(), coils);
        }

        balance
    }

    /// Annual totals of the main heat transfer phenomena. Phenomena whose component is
    /// missing are left out.
    pub fn component_summary(&self) -> ComponentSummary {
        let mut rows = IndexMap::new();
        for (phenomenon, kind, level) in SUMMARY_ROWS {
            match self.separate_gains_and_losses(kind, level) {
                Ok(decomposed) => {
                    rows.insert(phenomenon.to_string(), decomposed.totals());
                }
                Err(err) => debug!("Leaving {phenomenon} out of the summary: {err}"),
            }
        }

        ComponentSummary {
            units: self.units,
            rows,
        }
    }

    /// Net heat flow through each building surface: opaque conduction of the surface plus the
    /// flow through every window on it.
    pub fn face_energy_flow(&self) -> OutputSeriesTable {
        let faces = OutputSeriesTable::concat(
            [&self.opaque_conduction, &self.window_surface_flow]
                .into_iter()
                .flatten()
                .cloned(),
        );
        if faces.is_empty() {
            return OutputSeriesTable::empty();
        }

        let units = self.units.to_string();
        let columns = faces
            .sum_by(|key| {
                key.surface
                    .as_ref()
                    .and_then(|surface| surface.building_surface_name.clone())
                    .unwrap_or_else(|| key.key_value.clone())
            })
            .into_iter()
            .map(|(surface, values)| {
                Column::new(ColumnKey::new(FACE_ENERGY_FLOW, surface), units.clone(), values)
            })
            .collect();

        OutputSeriesTable::new(faces.index().to_vec(), columns)
    }

    /// Derive the Sankey diagram of the annual balance and write it to `output` under the
    /// `sankey` location key.
    pub fn to_sankey(
        &self,
        reports: &impl TabularReports,
        output: impl Output,
    ) -> anyhow::Result<Vec<SankeyFlow>> {
        let annual = self.to_df(true).annual_by_component();
        let flows = sankey_flows(&annual, self.units, &reports.end_use_summary()?)?;
        write_sankey_flows(&flows, output)?;

        Ok(flows)
    }
}

/// Keep the HVAC input of each zone only at the timesteps the zone is in `mode`.
fn mask_by_mode(table: &OutputSeriesTable, modes: &ModeTable, mode: Mode) -> OutputSeriesTable {
    let mut masked = table.clone();
    for column in masked.columns_mut() {
        let zone = column.key.zone_name();
        for (t, value) in column.values.iter_mut().enumerate() {
            if modes.mode(zone, t) != mode {
                *value = 0.;
            }
        }
    }
    masked
}

fn reconcile_pair(
    kind: Component,
    gain: &OutputSeriesTable,
    loss: &OutputSeriesTable,
    level: RenameLevel,
) -> Option<OutputSeriesTable> {
    if gain.is_empty() || loss.is_empty() {
        debug!("Skipping {kind}: gain or loss series were not reported");
        return None;
    }
    let net = subtract_loss_from_gain(gain, loss, level);
    if net.is_none() {
        warn!(
            "Skipping {kind}: gain series {:?} do not pair up with loss series {:?}",
            gain.shape(),
            loss.shape()
        );
    }
    net
}

/// `(cooling - ventilation gain) - (heating - ventilation loss)` per zone, or `None` unless
/// every ventilated zone has all four series over the same timestamps.
fn net_mechanical_ventilation(
    vent_gain: &OutputSeriesTable,
    vent_loss: &OutputSeriesTable,
    heating: &OutputSeriesTable,
    cooling: &OutputSeriesTable,
) -> Option<OutputSeriesTable> {
    if [vent_gain, vent_loss, heating, cooling]
        .iter()
        .any(|table| table.is_empty())
    {
        debug!("Skipping mechanical ventilation: ventilation or HVAC series were not reported");
        return None;
    }
    if vent_gain.index() != vent_loss.index()
        || vent_gain.index() != heating.index()
        || heating.index() != cooling.index()
    {
        warn!("Skipping mechanical ventilation: ventilation and HVAC series do not line up");
        return None;
    }

    let by_zone = |table: &OutputSeriesTable| table.sum_by(|key| key.zone_name().to_uppercase());
    let (gain_by_zone, loss_by_zone) = (by_zone(vent_gain), by_zone(vent_loss));
    let (heating_by_zone, cooling_by_zone) = (by_zone(heating), by_zone(cooling));
    if gain_by_zone.keys().any(|zone| {
        !loss_by_zone.contains_key(zone)
            || !heating_by_zone.contains_key(zone)
            || !cooling_by_zone.contains_key(zone)
    }) {
        warn!("Skipping mechanical ventilation: ventilated zones have no HVAC input");
        return None;
    }

    let units = vent_gain.columns()[0].units.clone();
    let columns = gain_by_zone
        .iter()
        .map(|(zone, gain)| {
            let (loss, heating, cooling) = (
                &loss_by_zone[zone],
                &heating_by_zone[zone],
                &cooling_by_zone[zone],
            );
            let values = (0..gain.len())
                .map(|t| (cooling[t] - gain[t]) - (heating[t] - loss[t]))
                .collect();
            Column::new(
                ColumnKey::new(MECHANICAL_VENTILATION, zone.clone()),
                units.clone(),
                values,
            )
        })
        .collect();

    Some(OutputSeriesTable::new(vent_gain.index().to_vec(), columns))
}

/// Heat conducted into each surface from outside, `-(outside face conduction + storage)`.
///
/// Storage is matched to conduction by surface name; without storage over the same
/// timestamps the conduction alone is used.
fn net_opaque_conduction(
    flow: &OutputSeriesTable,
    storage: &OutputSeriesTable,
) -> OutputSeriesTable {
    let mut net = flow.map_values(|value| -value);
    if storage.is_empty() {
        return net;
    }
    if storage.index() != flow.index() {
        warn!("Surface heat storage does not line up with surface conduction, leaving it out");
        return net;
    }

    let storage_by_surface = storage.sum_by(|key| key.key_value.clone());
    for column in net.columns_mut() {
        match storage_by_surface.get(&column.key.key_value) {
            Some(stored) => {
                for (value, stored) in column.values.iter_mut().zip(stored) {
                    *value -= stored;
                }
            }
            None => debug!("No heat storage reported for surface '{}'", column.key.key_value),
        }
    }
    net
}
