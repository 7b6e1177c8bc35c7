extern crate end_use_balance;

use clap::{Args, Parser};
use end_use_balance::core::units::{EnergyUnit, PowerUnit};
use end_use_balance::output::FileOutput;
use end_use_balance::simulation_time::ReportingFrequency;
use end_use_balance::{run_balance, BalanceConfig};
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct BalanceArgs {
    /// Variable CSV written by ReadVarsESO
    results_file: String,
    #[arg(long, short)]
    model_context: String,
    /// End use table (EndUse,EnergySource,Units,Value); needed for the Sankey flows
    #[arg(long, short, requires = "conditioned_floor_area")]
    end_uses: Option<String>,
    /// Net conditioned building area in m2, to express the Sankey flows per unit area
    #[arg(long)]
    conditioned_floor_area: Option<f64>,
    /// JSON file with balance settings; the flags below override it
    #[arg(long, short)]
    config: Option<String>,
    #[command(flatten)]
    overrides: ConfigOverrides,
    #[arg(long, short)]
    output_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    combined_gains_and_losses: bool,
}

#[derive(Args, Clone, Default, Debug)]
struct ConfigOverrides {
    #[arg(long)]
    units: Option<EnergyUnit>,
    #[arg(long)]
    power_units: Option<PowerUnit>,
    #[arg(long)]
    reporting_frequency: Option<ReportingFrequency>,
    /// Keep interior partitions in the opaque conduction
    #[arg(long, default_value_t = false)]
    all_surfaces: bool,
}

impl ConfigOverrides {
    fn apply(&self, mut config: BalanceConfig) -> BalanceConfig {
        if let Some(units) = self.units {
            config.units = units;
        }
        if let Some(power_units) = self.power_units {
            config.power_units = power_units;
        }
        if let Some(reporting_frequency) = self.reporting_frequency {
            config.reporting_frequency = reporting_frequency;
        }
        if self.all_surfaces {
            config.outdoor_surfaces_only = false;
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = BalanceArgs::parse();

    let config = match &args.config {
        Some(config_file) => BalanceConfig::from_reader(BufReader::new(File::open(config_file)?))?,
        None => Default::default(),
    };
    let config = args.overrides.apply(config);

    let results_file = Path::new(args.results_file.as_str());
    let results_file_stem = results_file
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("balance");
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => results_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let file_template = format!(
        "{}__{{}}.csv",
        results_file_stem.replace('{', "{{").replace('}', "}}")
    );
    let output = FileOutput::new(output_dir.clone(), file_template);

    let end_uses = args
        .end_uses
        .as_ref()
        .map(|file| File::open(file).map(BufReader::new))
        .transpose()?;

    let run_results = run_balance(
        BufReader::new(File::open(results_file)?),
        end_uses,
        BufReader::new(File::open(&args.model_context)?),
        &config,
        args.conditioned_floor_area.unwrap_or_default(),
        !args.combined_gains_and_losses,
        &output,
    )?;

    match run_results.sankey {
        Some(flows) => info!(
            "Wrote balance and {} Sankey flows to {}",
            flows.len(),
            output_dir.display()
        ),
        None => info!("Wrote balance to {}", output_dir.display()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_require_floor_area_with_end_uses() {
        let args = [
            "end-use-balance",
            "results.csv",
            "--model-context",
            "model.json",
            "--end-uses",
            "end_uses.csv",
        ];
        assert!(BalanceArgs::try_parse_from(args).is_err());

        let args = BalanceArgs::try_parse_from(
            args.into_iter()
                .chain(["--conditioned-floor-area", "250"]),
        )
        .unwrap();
        assert_eq!(args.conditioned_floor_area, Some(250.));
    }

    #[rstest]
    fn should_not_require_floor_area_without_end_uses() {
        let args = BalanceArgs::try_parse_from([
            "end-use-balance",
            "results.csv",
            "--model-context",
            "model.json",
        ])
        .unwrap();
        assert_eq!(args.conditioned_floor_area, None);
    }

    #[rstest]
    fn should_override_config_from_flags() {
        let args = BalanceArgs::try_parse_from([
            "end-use-balance",
            "results.csv",
            "--model-context",
            "model.json",
            "--units",
            "Wh",
            "--all-surfaces",
        ])
        .unwrap();
        let config = args.overrides.apply(BalanceConfig::default());
        assert_eq!(config.units, EnergyUnit::Wh);
        assert!(!config.outdoor_surfaces_only);
    }
}
