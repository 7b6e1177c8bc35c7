//! The explicit entity store handed to the balance: zones, their surfaces and the windows on
//! those surfaces, with just the fields needed to attribute surface-level flows to zones.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Read;
use strum_macros::{Display, EnumString};

pub fn ingest_model_context(json: impl Read) -> anyhow::Result<ModelContext> {
    let input: ModelContextInput = serde_json::from_reader(json)?;
    Ok(ModelContext::new(input.zones, input.surfaces, input.sub_surfaces))
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[strum(ascii_case_insensitive)]
pub enum SurfaceType {
    Wall,
    Roof,
    Floor,
    Ceiling,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[strum(ascii_case_insensitive)]
pub enum BoundaryCondition {
    Outdoors,
    Ground,
    /// Interior partition facing another surface of the model.
    Surface,
    Adiabatic,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ZoneMetadata {
    pub name: String,
    #[serde(default)]
    pub multiplier: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SurfaceMetadata {
    pub name: String,
    pub surface_type: SurfaceType,
    #[serde(default)]
    pub outside_boundary_condition: Option<BoundaryCondition>,
    pub zone_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct WindowMetadata {
    pub name: String,
    pub building_surface_name: String,
    #[serde(default)]
    pub multiplier: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ModelContextInput {
    pub zones: Vec<ZoneMetadata>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceMetadata>,
    #[serde(default)]
    pub sub_surfaces: Vec<WindowMetadata>,
}

/// A resolved multiplier: unset and zero multipliers count as one.
pub(crate) fn resolve_multiplier(multiplier: Option<u32>) -> u32 {
    match multiplier {
        Some(multiplier) if multiplier > 0 => multiplier,
        _ => 1,
    }
}

/// Lookups from (case-insensitive) names to zone, surface and window metadata.
///
/// Result stores report key values in upper case, so every lookup is keyed on the
/// upper-cased name.
#[derive(Clone, Debug, Default)]
pub struct ModelContext {
    zones: IndexMap<String, ZoneMetadata>,
    surfaces: IndexMap<String, SurfaceMetadata>,
    sub_surfaces: IndexMap<String, WindowMetadata>,
}

impl ModelContext {
    pub fn new(
        zones: Vec<ZoneMetadata>,
        surfaces: Vec<SurfaceMetadata>,
        sub_surfaces: Vec<WindowMetadata>,
    ) -> Self {
        Self {
            zones: zones
                .into_iter()
                .map(|zone| (zone.name.to_uppercase(), zone))
                .collect(),
            surfaces: surfaces
                .into_iter()
                .map(|surface| (surface.name.to_uppercase(), surface))
                .collect(),
            sub_surfaces: sub_surfaces
                .into_iter()
                .map(|window| (window.name.to_uppercase(), window))
                .collect(),
        }
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneMetadata> {
        self.zones.get(&name.to_uppercase())
    }

    pub fn surface(&self, name: &str) -> Option<&SurfaceMetadata> {
        self.surfaces.get(&name.to_uppercase())
    }

    pub fn sub_surface(&self, name: &str) -> Option<&WindowMetadata> {
        self.sub_surfaces.get(&name.to_uppercase())
    }

    pub fn zones(&self) -> impl Iterator<Item = &ZoneMetadata> {
        self.zones.values()
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &SurfaceMetadata> {
        self.surfaces.values()
    }

    pub fn sub_surfaces(&self) -> impl Iterator<Item = &WindowMetadata> {
        self.sub_surfaces.values()
    }

    /// Multiplier of the named zone; zones that are unknown or have a zero multiplier count once.
    pub fn zone_multiplier(&self, zone_name: &str) -> u32 {
        resolve_multiplier(self.zone(zone_name).and_then(|zone| zone.multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    #[fixture]
    fn context_json() -> &'static str {
        r#"{
            "Zones": [
                {"Name": "Zone 1", "Multiplier": 3},
                {"Name": "Zone 2", "Multiplier": 0},
                {"Name": "Zone 3"}
            ],
            "Surfaces": [
                {"Name": "Wall 1", "SurfaceType": "Wall", "OutsideBoundaryCondition": "Outdoors", "ZoneName": "Zone 1"},
                {"Name": "Partition", "SurfaceType": "Wall", "OutsideBoundaryCondition": "Surface", "ZoneName": "Zone 2"},
                {"Name": "Slab", "SurfaceType": "Floor", "ZoneName": "Zone 3"}
            ],
            "SubSurfaces": [
                {"Name": "Window 1", "BuildingSurfaceName": "Wall 1", "Multiplier": 2}
            ]
        }"#
    }

    #[rstest]
    fn should_ingest_model_context(context_json: &str) {
        let context = ingest_model_context(Cursor::new(context_json)).unwrap();

        assert_eq!(context.zones().count(), 3);
        assert_eq!(context.surface("WALL 1").unwrap().zone_name, "Zone 1");
        assert_eq!(
            context.surface("slab").unwrap().outside_boundary_condition,
            None
        );
        assert_eq!(
            context.sub_surface("WINDOW 1").unwrap().building_surface_name,
            "Wall 1"
        );
    }

    #[rstest]
    fn should_default_zero_and_missing_multipliers_to_one(context_json: &str) {
        let context = ingest_model_context(Cursor::new(context_json)).unwrap();

        assert_eq!(context.zone_multiplier("ZONE 1"), 3);
        assert_eq!(context.zone_multiplier("ZONE 2"), 1);
        assert_eq!(context.zone_multiplier("ZONE 3"), 1);
        assert_eq!(context.zone_multiplier("NOT A ZONE"), 1);
    }

    #[rstest]
    fn should_reject_unknown_fields() {
        let json = r#"{"Zones": [{"Name": "Zone 1", "Volume": 12.0}]}"#;
        assert!(ingest_model_context(Cursor::new(json)).is_err());
    }

    #[rstest]
    fn should_use_one_key_casing_throughout() {
        let snake_case_surface = r#"{
            "Zones": [{"Name": "Zone 1"}],
            "Surfaces": [{"name": "Wall 1", "surface_type": "Wall", "zone_name": "Zone 1"}]
        }"#;
        assert!(ingest_model_context(Cursor::new(snake_case_surface)).is_err());
    }
}
