use crate::core::table::{Column, OutputSeriesTable, SurfaceAttribution};
use crate::model::{resolve_multiplier, BoundaryCondition, ModelContext};
use tracing::warn;

/// Attach the surface type, outside boundary condition and owning zone to every
/// surface-keyed column, scaling the flow by the multiplier of that zone.
///
/// Columns whose key value does not name a surface of the model are dropped.
pub fn match_opaque_surface_to_zone(
    flow: &OutputSeriesTable,
    context: &ModelContext,
) -> OutputSeriesTable {
    attribute(flow, |column| {
        let Some(surface) = context.surface(&column.key.key_value) else {
            warn!(
                "Dropping '{}': no building surface named '{}'",
                column.key.variable, column.key.key_value
            );
            return None;
        };
        let zone_name = surface.zone_name.to_uppercase();
        let multiplier = context.zone_multiplier(&zone_name) as f64;

        Some((
            SurfaceAttribution {
                building_surface_name: None,
                surface_type: surface.surface_type,
                boundary_condition: surface.outside_boundary_condition,
                zone_name,
            },
            multiplier,
        ))
    })
}

/// Keep only surfaces facing the outdoors, the ground or an adiabatic boundary.
///
/// Interior partitions and surfaces whose boundary condition is unknown are removed.
pub fn drop_interior_surfaces(table: &OutputSeriesTable) -> OutputSeriesTable {
    table.retain_columns(|column| {
        matches!(
            column
                .key
                .surface
                .as_ref()
                .and_then(|surface| surface.boundary_condition),
            Some(boundary_condition) if boundary_condition != BoundaryCondition::Surface
        )
    })
}

/// Attach the building surface a window sits on, that surface's type and the zone that owns
/// it to every window-keyed column.
///
/// The flow is scaled by the window's own multiplier; the zone multiplier does not apply.
pub fn match_window_to_zone(
    flow: &OutputSeriesTable,
    context: &ModelContext,
) -> OutputSeriesTable {
    attribute(flow, |column| {
        let Some(window) = context.sub_surface(&column.key.key_value) else {
            warn!(
                "Dropping '{}': no window named '{}'",
                column.key.variable, column.key.key_value
            );
            return None;
        };
        let Some(surface) = context.surface(&window.building_surface_name) else {
            warn!(
                "Dropping '{}': window '{}' is on unknown surface '{}'",
                column.key.variable, window.name, window.building_surface_name
            );
            return None;
        };

        Some((
            SurfaceAttribution {
                building_surface_name: Some(window.building_surface_name.to_uppercase()),
                surface_type: surface.surface_type,
                boundary_condition: surface.outside_boundary_condition,
                zone_name: surface.zone_name.to_uppercase(),
            },
            resolve_multiplier(window.multiplier) as f64,
        ))
    })
}

fn attribute(
    flow: &OutputSeriesTable,
    resolve: impl Fn(&Column) -> Option<(SurfaceAttribution, f64)>,
) -> OutputSeriesTable {
    if flow.is_empty() {
        return OutputSeriesTable::empty();
    }

    let columns = flow
        .columns()
        .iter()
        .filter_map(|column| {
            let (attribution, multiplier) = resolve(column)?;
            Some(Column::new(
                column.key.clone().with_surface(attribution),
                column.units.clone(),
                column.values.iter().map(|value| value * multiplier).collect(),
            ))
        })
        .collect();

    OutputSeriesTable::new(flow.index().to_vec(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::ColumnKey;
    use crate::model::{SurfaceMetadata, SurfaceType, WindowMetadata, ZoneMetadata};
    use crate::simulation_time::hourly_index;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn context() -> ModelContext {
        ModelContext::new(
            vec![
                ZoneMetadata {
                    name: "Z1".to_string(),
                    multiplier: Some(3),
                },
                ZoneMetadata {
                    name: "Z2".to_string(),
                    multiplier: None,
                },
            ],
            vec![
                SurfaceMetadata {
                    name: "Wall 1".to_string(),
                    surface_type: SurfaceType::Wall,
                    outside_boundary_condition: Some(BoundaryCondition::Outdoors),
                    zone_name: "Z1".to_string(),
                },
                SurfaceMetadata {
                    name: "Partition".to_string(),
                    surface_type: SurfaceType::Wall,
                    outside_boundary_condition: Some(BoundaryCondition::Surface),
                    zone_name: "Z2".to_string(),
                },
                SurfaceMetadata {
                    name: "Slab".to_string(),
                    surface_type: SurfaceType::Floor,
                    outside_boundary_condition: None,
                    zone_name: "Z2".to_string(),
                },
            ],
            vec![
                WindowMetadata {
                    name: "Window 1".to_string(),
                    building_surface_name: "Wall 1".to_string(),
                    multiplier: Some(2),
                },
                WindowMetadata {
                    name: "Window 2".to_string(),
                    building_surface_name: "Wall 1".to_string(),
                    multiplier: Some(0),
                },
            ],
        )
    }

    fn surface_flow(keys: &[&str]) -> OutputSeriesTable {
        OutputSeriesTable::new(
            hourly_index(2018, 1),
            keys.iter()
                .map(|key| {
                    Column::new(
                        ColumnKey::new("Surface Outside Face Conduction Heat Transfer Energy", *key),
                        "kWh",
                        vec![100.],
                    )
                })
                .collect(),
        )
    }

    #[rstest]
    fn should_scale_opaque_flow_by_zone_multiplier(context: ModelContext) {
        let attributed =
            match_opaque_surface_to_zone(&surface_flow(&["WALL 1", "PARTITION"]), &context);

        assert_eq!(attributed.columns()[0].values, vec![300.]);
        assert_eq!(attributed.columns()[0].key.zone_name(), "Z1");
        assert_eq!(
            attributed.columns()[0].key.surface.as_ref().unwrap().surface_type,
            SurfaceType::Wall
        );
        assert_eq!(attributed.columns()[1].values, vec![100.]);
    }

    #[rstest]
    fn should_drop_unknown_surfaces(context: ModelContext) {
        let attributed =
            match_opaque_surface_to_zone(&surface_flow(&["WALL 1", "NOT A SURFACE"]), &context);
        assert_eq!(attributed.shape(), (1, 1));
    }

    #[rstest]
    fn should_keep_only_outdoor_facing_surfaces(context: ModelContext) {
        let attributed = match_opaque_surface_to_zone(
            &surface_flow(&["WALL 1", "PARTITION", "SLAB"]),
            &context,
        );

        let outdoor = drop_interior_surfaces(&attributed);

        assert_eq!(
            outdoor
                .columns()
                .iter()
                .map(|column| column.key.key_value.as_str())
                .collect::<Vec<_>>(),
            vec!["WALL 1"]
        );
    }

    #[rstest]
    fn should_attribute_window_to_zone_of_its_wall(context: ModelContext) {
        let flow = OutputSeriesTable::new(
            hourly_index(2018, 2),
            vec![
                Column::new(
                    ColumnKey::new("Surface Window Heat Energy", "WINDOW 1"),
                    "kWh",
                    vec![10., -5.],
                ),
                Column::new(
                    ColumnKey::new("Surface Window Heat Energy", "WINDOW 2"),
                    "kWh",
                    vec![1., 1.],
                ),
            ],
        );

        let attributed = match_window_to_zone(&flow, &context);

        let window = &attributed.columns()[0];
        assert_eq!(window.key.zone_name(), "Z1");
        assert_eq!(window.values, vec![20., -10.]);
        assert_eq!(
            window.key.surface.as_ref().unwrap().building_surface_name,
            Some("WALL 1".to_string())
        );
        assert_eq!(attributed.columns()[1].values, vec![1., 1.]);
    }

    #[rstest]
    fn should_pass_empty_flow_through(context: ModelContext) {
        assert!(match_opaque_surface_to_zone(&OutputSeriesTable::empty(), &context).is_empty());
        assert!(match_window_to_zone(&OutputSeriesTable::empty(), &context).is_empty());
    }
}
