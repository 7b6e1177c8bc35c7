#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod errors;
pub mod model;
pub mod output;
pub mod read_results_file;
pub mod results;
pub mod simulation_time;

pub use crate::core::end_use_balance::balance::{BalanceConfig, EndUseBalance};
use crate::core::end_use_balance::sankey::SankeyFlow;
use crate::model::ingest_model_context;
use crate::output::Output;
use crate::read_results_file::{end_uses_from_csv, results_from_csv};
use anyhow::Context;
use std::io::Read;
use tracing::info;

pub const BALANCE_LOCATION_KEY: &str = "balance";
pub const COMPONENT_SUMMARY_LOCATION_KEY: &str = "component_summary";

#[derive(Debug)]
pub struct RunResults {
    pub balance: EndUseBalance,
    /// Only derived when an end use table was given.
    pub sankey: Option<Vec<SankeyFlow>>,
}

/// Reconcile the results of a completed simulation and write the balance table, the component
/// summary and (given an end use table) the Sankey flows to `output`.
pub fn run_balance(
    results: impl Read,
    end_uses: Option<impl Read>,
    model_context: impl Read,
    config: &BalanceConfig,
    conditioned_floor_area: f64,
    separate_gains_and_losses: bool,
    output: impl Output,
) -> anyhow::Result<RunResults> {
    let mut results = results_from_csv(results).context("Could not read simulation results")?;
    let context = ingest_model_context(model_context).context("Could not read model context")?;
    let has_end_uses = end_uses.is_some();
    if let Some(end_uses) = end_uses {
        results.set_end_uses(
            end_uses_from_csv(end_uses, conditioned_floor_area)
                .context("Could not read end use summary")?,
        );
    }

    let balance = EndUseBalance::from_results(&results, &context, config)?;

    if !output.is_noop() {
        balance
            .to_df(separate_gains_and_losses)
            .write_csv(output.writer_for_location_key(BALANCE_LOCATION_KEY)?)?;
        balance
            .component_summary()
            .write_csv(output.writer_for_location_key(COMPONENT_SUMMARY_LOCATION_KEY)?)?;
    }

    let sankey = if has_end_uses {
        Some(balance.to_sankey(&results, output)?)
    } else {
        info!("No end use summary given, skipping the Sankey flows");
        None
    };

    Ok(RunResults { balance, sankey })
}
