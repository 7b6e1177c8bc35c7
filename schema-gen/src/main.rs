use end_use_balance::model::ModelContextInput;
use end_use_balance::BalanceConfig;
use schemars::schema_for;
use std::env;

fn main() {
    let schema = match env::args().nth(1).as_deref() {
        Some("config") => schema_for!(BalanceConfig),
        _ => schema_for!(ModelContextInput),
    };
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}
