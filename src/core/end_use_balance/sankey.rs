//! Sankey diagram of the annual energy balance: energy sources feed the end uses of the
//! building, heating and cooling feed their loads, and the loads fan out into the components
//! that add or remove heat.

use crate::core::end_use_balance::balance::{HeatFlow, Period};
use crate::core::units::{convert_energy, EnergyUnit};
use crate::output::Output;
use crate::results::EndUseSummary;
use anyhow::bail;
use csv::WriterBuilder;
use indexmap::IndexMap;
use serde::Serialize;

/// Value given to links that only exist to lay the diagram out.
pub const NOMINAL_LINK_VALUE: f64 = 0.01;
pub const SANKEY_LOCATION_KEY: &str = "sankey";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SankeyFlow {
    pub source: String,
    pub target: String,
    pub value: f64,
}

impl SankeyFlow {
    fn new(source: impl Into<String>, target: impl Into<String>, value: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
        }
    }
}

fn node_label(component: &str) -> &str {
    match component {
        "People Gain" => "Occupants",
        "Solar Gain" => "Passive Solar",
        "Electric Equipment" => "Equipment",
        "Window Conduction" => "Windows",
        "Wall" => "Walls",
        other => other,
    }
}

/// Annual load of every component in one period, in kWh, keyed by node label.
fn period_loads(
    annual: &IndexMap<(String, Period, HeatFlow), f64>,
    units: EnergyUnit,
    period: Period,
    flow: HeatFlow,
) -> Vec<(String, f64)> {
    let mut loads: IndexMap<String, f64> = IndexMap::new();
    for ((component, component_period, component_flow), value) in annual {
        if *component_period == period && *component_flow == flow {
            *loads.entry(node_label(component).to_string()).or_insert(0.) +=
                convert_energy(*value, units, EnergyUnit::KWh);
        }
    }
    loads
        .into_iter()
        .filter(|(_, value)| *value != 0.)
        .map(|(label, value)| (label, value.abs()))
        .collect()
}

/// Heat gains during heating periods feed the heating load, which is lost through each
/// component. Returns the load flows and the layout links.
fn heating_side(
    annual: &IndexMap<(String, Period, HeatFlow), f64>,
    units: EnergyUnit,
) -> (Vec<SankeyFlow>, Vec<SankeyFlow>) {
    let mut flows = vec![];
    let mut links = vec![];
    for (label, value) in period_loads(annual, units, Period::Heating, HeatFlow::Gain) {
        let source = match label.as_str() {
            "Heating" => "Heating System".to_string(),
            _ => format!("{label} Gain"),
        };
        if source != "Heating System" {
            links.push(SankeyFlow::new("Heating", source.clone(), NOMINAL_LINK_VALUE));
        }
        flows.push(SankeyFlow::new(source, "Heating Load", value));
    }
    for (label, value) in period_loads(annual, units, Period::Heating, HeatFlow::Loss) {
        flows.push(SankeyFlow::new(
            "Heating Load",
            format!("{label} Heat Losses"),
            value,
        ));
    }
    (flows, links)
}

/// Heat losses during cooling periods feed the cooling load, which every heat gain adds to.
/// Returns the load flows and the layout links.
fn cooling_side(
    annual: &IndexMap<(String, Period, HeatFlow), f64>,
    units: EnergyUnit,
) -> (Vec<SankeyFlow>, Vec<SankeyFlow>) {
    let mut flows = vec![];
    let mut links = vec![];
    for (label, value) in period_loads(annual, units, Period::Cooling, HeatFlow::Loss) {
        let source = match label.as_str() {
            "Cooling" => "Cooling System".to_string(),
            _ => format!("{label} Losses"),
        };
        if source != "Cooling System" {
            links.push(SankeyFlow::new("Cooling", source.clone(), NOMINAL_LINK_VALUE));
        }
        flows.push(SankeyFlow::new(source, "Cooling Load", value));
    }
    for (label, value) in period_loads(annual, units, Period::Cooling, HeatFlow::Gain) {
        if label != "Cooling" {
            flows.push(SankeyFlow::new("Cooling Load", label, value));
        }
    }
    (flows, links)
}

/// Move whatever the load does not balance onto the flow out of the HVAC system.
fn balance_load(flows: &mut [SankeyFlow], load: &str, system: &str) {
    let out_of_load: f64 = flows
        .iter()
        .filter(|flow| flow.source == load)
        .map(|flow| flow.value)
        .sum();
    let into_load: f64 = flows
        .iter()
        .filter(|flow| flow.target == load)
        .map(|flow| flow.value)
        .sum();
    let difference = out_of_load - into_load;
    for flow in flows.iter_mut().filter(|flow| flow.source == system) {
        flow.value += difference;
    }
}

/// Derive the Sankey edges from the annual totals of a decomposed balance and the end use
/// summary of the same simulation.
///
/// Flows are expressed in kWh per m2 of conditioned floor area; layout links keep
/// [`NOMINAL_LINK_VALUE`].
pub fn sankey_flows(
    annual: &IndexMap<(String, Period, HeatFlow), f64>,
    units: EnergyUnit,
    end_uses: &EndUseSummary,
) -> anyhow::Result<Vec<SankeyFlow>> {
    let floor_area = end_uses.conditioned_floor_area();
    if floor_area.is_nan() || floor_area <= 0. {
        bail!("Cannot normalise the Sankey flows by a conditioned floor area of {floor_area} m2");
    }

    let system_input = end_uses
        .to_units(EnergyUnit::KWh)
        .iter()
        .filter(|(_, _, value)| *value != 0.)
        .map(|(end_use, source, value)| SankeyFlow::new(source, end_use, value))
        .collect::<Vec<_>>();
    let end_use_total = |end_use: &str| -> f64 {
        system_input
            .iter()
            .filter(|flow| flow.target == end_use)
            .map(|flow| flow.value)
            .sum()
    };

    let (heating_flows, heating_links) = heating_side(annual, units);
    let (cooling_flows, cooling_links) = cooling_side(annual, units);

    let mut flows = system_input.clone();
    flows.push(SankeyFlow::new(
        "Heating",
        "Heating System",
        end_use_total("Heating"),
    ));
    flows.extend(heating_flows);
    flows.push(SankeyFlow::new(
        "Cooling",
        "Cooling System",
        end_use_total("Cooling"),
    ));
    flows.extend(cooling_flows);

    balance_load(&mut flows, "Heating Load", "Heating System");
    balance_load(&mut flows, "Cooling Load", "Cooling System");

    for flow in flows.iter_mut() {
        for node in [&mut flow.source, &mut flow.target] {
            if *node == "OA Heating Heat Losses" {
                *node = "OA Heating".to_string();
            }
        }
        flow.value /= floor_area;
    }

    flows.extend(heating_links);
    flows.extend(cooling_links);

    Ok(flows)
}

/// Write `source,target,value` records to the `sankey` location of `output`.
pub fn write_sankey_flows(flows: &[SankeyFlow], output: impl Output) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }
    let writer = output.writer_for_location_key(SANKEY_LOCATION_KEY)?;
    let mut writer = WriterBuilder::new().from_writer(writer);
    for flow in flows {
        writer.serialize(flow)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SinkOutput;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn annual() -> IndexMap<(String, Period, HeatFlow), f64> {
        IndexMap::from([
            (("Heating".to_string(), Period::Heating, HeatFlow::Gain), 100.),
            (("Lighting".to_string(), Period::Heating, HeatFlow::Gain), 20.),
            (("Wall".to_string(), Period::Heating, HeatFlow::Loss), -90.),
            (("Window Conduction".to_string(), Period::Heating, HeatFlow::Loss), -40.),
            (("OA Heating".to_string(), Period::Heating, HeatFlow::Loss), 10.),
            (("Cooling".to_string(), Period::Cooling, HeatFlow::Loss), -50.),
            (("Solar Gain".to_string(), Period::Cooling, HeatFlow::Gain), 30.),
            (("Infiltration".to_string(), Period::Cooling, HeatFlow::Loss), -5.),
            (("Infiltration".to_string(), Period::Heating, HeatFlow::Gain), 0.),
        ])
    }

    #[fixture]
    fn end_uses() -> EndUseSummary {
        let mut end_uses = EndUseSummary::new(EnergyUnit::KWh, 10.);
        end_uses.insert("Heating", "Natural Gas", 120.);
        end_uses.insert("Cooling", "Electricity", 60.);
        end_uses.insert("Interior Lighting", "Electricity", 25.);
        end_uses.insert("Fans", "Electricity", 0.);
        end_uses
    }

    fn value_of(flows: &[SankeyFlow], source: &str, target: &str) -> Option<f64> {
        flows
            .iter()
            .find(|flow| flow.source == source && flow.target == target)
            .map(|flow| flow.value)
    }

    #[rstest]
    fn should_route_system_input_to_end_uses(
        annual: IndexMap<(String, Period, HeatFlow), f64>,
        end_uses: EndUseSummary,
    ) {
        let flows = sankey_flows(&annual, EnergyUnit::KWh, &end_uses).unwrap();

        assert_relative_eq!(value_of(&flows, "Natural Gas", "Heating").unwrap(), 12.);
        assert_relative_eq!(value_of(&flows, "Electricity", "Interior Lighting").unwrap(), 2.5);
        assert_eq!(value_of(&flows, "Electricity", "Fans"), None);
        assert_relative_eq!(value_of(&flows, "Heating", "Heating System").unwrap(), 12.);
        assert_relative_eq!(value_of(&flows, "Cooling", "Cooling System").unwrap(), 6.);
    }

    #[rstest]
    fn should_balance_heating_load(
        annual: IndexMap<(String, Period, HeatFlow), f64>,
        end_uses: EndUseSummary,
    ) {
        let flows = sankey_flows(&annual, EnergyUnit::KWh, &end_uses).unwrap();

        assert_relative_eq!(value_of(&flows, "Lighting Gain", "Heating Load").unwrap(), 2.);
        assert_relative_eq!(value_of(&flows, "Heating Load", "Walls Heat Losses").unwrap(), 9.);
        assert_relative_eq!(value_of(&flows, "Heating Load", "Windows Heat Losses").unwrap(), 4.);
        assert_relative_eq!(value_of(&flows, "Heating Load", "OA Heating").unwrap(), 1.);
        // 140 out of the load, 20 in besides the system
        assert_relative_eq!(value_of(&flows, "Heating System", "Heating Load").unwrap(), 12.);
        assert_eq!(value_of(&flows, "Infiltration Gain", "Heating Load"), None);
    }

    #[rstest]
    fn should_balance_cooling_load(
        annual: IndexMap<(String, Period, HeatFlow), f64>,
        end_uses: EndUseSummary,
    ) {
        let flows = sankey_flows(&annual, EnergyUnit::KWh, &end_uses).unwrap();

        assert_relative_eq!(value_of(&flows, "Infiltration Losses", "Cooling Load").unwrap(), 0.5);
        assert_relative_eq!(value_of(&flows, "Cooling Load", "Passive Solar").unwrap(), 3.);
        assert_relative_eq!(value_of(&flows, "Cooling System", "Cooling Load").unwrap(), 2.5);
    }

    #[rstest]
    fn should_add_undivided_layout_links(
        annual: IndexMap<(String, Period, HeatFlow), f64>,
        end_uses: EndUseSummary,
    ) {
        let flows = sankey_flows(&annual, EnergyUnit::KWh, &end_uses).unwrap();

        assert_eq!(
            value_of(&flows, "Heating", "Lighting Gain"),
            Some(NOMINAL_LINK_VALUE)
        );
        assert_eq!(
            value_of(&flows, "Cooling", "Infiltration Losses"),
            Some(NOMINAL_LINK_VALUE)
        );
        assert!(value_of(&flows, "Heating", "Heating System").is_some());
        assert_eq!(
            flows
                .iter()
                .filter(|flow| flow.value == NOMINAL_LINK_VALUE)
                .count(),
            2
        );
    }

    #[rstest]
    fn should_express_loads_in_kwh(end_uses: EndUseSummary) {
        let annual = IndexMap::from([(
            ("Lighting".to_string(), Period::Heating, HeatFlow::Gain),
            36_000_000.,
        )]);
        let flows = sankey_flows(&annual, EnergyUnit::J, &end_uses).unwrap();
        assert_relative_eq!(value_of(&flows, "Lighting Gain", "Heating Load").unwrap(), 1.);
    }

    #[rstest]
    fn should_reject_missing_floor_area(annual: IndexMap<(String, Period, HeatFlow), f64>) {
        let end_uses = EndUseSummary::new(EnergyUnit::KWh, 0.);
        assert!(sankey_flows(&annual, EnergyUnit::KWh, &end_uses).is_err());
    }

    #[rstest]
    fn should_skip_writing_to_a_sink(
        annual: IndexMap<(String, Period, HeatFlow), f64>,
        end_uses: EndUseSummary,
    ) {
        let flows = sankey_flows(&annual, EnergyUnit::KWh, &end_uses).unwrap();
        write_sankey_flows(&flows, SinkOutput).unwrap();
    }
}
