use crate::core::end_use_balance::balance::Component;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("A reporting frequency other than hourly is not yet supported (inferred cadence: {})", describe_cadence(.0))]
    UnsupportedReportingFrequency(Option<Duration>),
    #[error("Expected the {0} component to be non-empty before separating gains and losses.")]
    EmptyComponent(Component),
    #[error("Unit '{0}' is not a recognised energy or power unit.")]
    UnknownUnit(String),
    #[error("Cannot convert a quantity in '{from}' to '{to}'.")]
    IncompatibleUnits { from: String, to: String },
    #[error("Error while reading simulation results: {0}")]
    InvalidResults(#[from] anyhow::Error),
}

fn describe_cadence(cadence: &Option<Duration>) -> String {
    match cadence {
        Some(cadence) => format!("{}s", cadence.as_secs()),
        None => "could not be inferred".to_string(),
    }
}
