use end_use_balance::model::ModelContextInput;
use end_use_balance::BalanceConfig;
use schemars::schema_for;

#[test]
fn test_generate_model_context_schema() {
    let schema = schema_for!(ModelContextInput);
    let json = serde_json::to_string_pretty(&schema).unwrap();
    assert!(json.contains("SubSurfaces"));
    assert!(json.contains("BuildingSurfaceName"));
}

#[test]
fn test_generate_config_schema() {
    let schema = schema_for!(BalanceConfig);
    let json = serde_json::to_string_pretty(&schema).unwrap();
    assert!(json.contains("OutdoorSurfacesOnly"));
}
