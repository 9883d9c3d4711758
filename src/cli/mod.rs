//! Command-line parsing for the epidemic growth-curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{LossKind, ModelSpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "epi", version, about = "Growth-curve fitting for daily case counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one count column of a CSV and print parameters and derived points.
    Fit(FitArgs),
    /// Fit every count column of a CSV in parallel and print a summary table.
    Batch(BatchArgs),
    /// Fit the built-in reference series (or a seeded synthetic outbreak).
    Demo(DemoArgs),
    /// Print a previously exported curve JSON.
    Inspect(InspectArgs),
}

/// Engine overrides shared by every fitting command.
///
/// Unset flags fall back to `EPI_*` environment variables, then to built-in defaults.
#[derive(Debug, Args, Clone, Default)]
pub struct EngineArgs {
    /// Lower bound of the normalization interval.
    #[arg(long)]
    pub norm_lower: Option<f64>,

    /// Upper bound of the normalization interval.
    #[arg(long)]
    pub norm_upper: Option<f64>,

    /// Start of the prediction curve in normalized x (data spans the normalization interval).
    #[arg(long, allow_hyphen_values = true)]
    pub domain_lower: Option<f64>,

    /// End of the prediction curve in normalized x.
    #[arg(long)]
    pub domain_upper: Option<f64>,

    /// Number of points in the prediction curve.
    #[arg(long)]
    pub curve_points: Option<usize>,

    /// Residual loss used by the solver.
    #[arg(long, value_enum)]
    pub loss: Option<LossKind>,

    /// Residual scale (normalized units) at which the robust loss flattens.
    #[arg(long)]
    pub loss_scale: Option<f64>,

    /// Maximum solver iterations.
    #[arg(long = "max-iter")]
    pub max_iterations: Option<usize>,
}

/// Options for fitting a single series.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Case-count CSV (header row, day column, count columns).
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Count column to fit.
    #[arg(short = 'c', long)]
    pub column: String,

    /// Day-index column.
    #[arg(long, default_value = "day")]
    pub x_column: String,

    /// Which family (or all families) to fit.
    #[arg(short = 'm', long, value_enum, default_value_t = ModelSpec::All)]
    pub model: ModelSpec,

    /// Slope thresholds (cases/day) for sigmoid crossing times. Repeatable.
    #[arg(short = 't', long = "threshold")]
    pub thresholds: Vec<f64>,

    /// Year used to label day indices as calendar dates.
    #[arg(long)]
    pub year: Option<i32>,

    /// Export curve (family + params + derived points + dense curve) to JSON.
    ///
    /// When several families are fitted, the family name is appended to the file stem.
    #[arg(long = "export-curve")]
    pub export_curve: Option<PathBuf>,

    /// Export per-observation residuals to CSV.
    #[arg(long = "export-residuals")]
    pub export_residuals: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Options for fitting many series.
#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    /// Case-count CSV (header row, day column, count columns).
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Count columns to fit (default: every column except the day column).
    #[arg(short = 'c', long = "column")]
    pub columns: Vec<String>,

    /// Day-index column.
    #[arg(long, default_value = "day")]
    pub x_column: String,

    /// Which family (or all families) to fit.
    #[arg(short = 'm', long, value_enum, default_value_t = ModelSpec::Sigmoid)]
    pub model: ModelSpec,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Options for the built-in demo.
#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Use a synthetic sigmoid outbreak instead of the reference series.
    #[arg(long)]
    pub synthetic: bool,

    /// Random seed for the synthetic outbreak's reporting noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Log-normal noise level for the synthetic outbreak (0 disables noise).
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// Which family (or all families) to fit.
    #[arg(short = 'm', long, value_enum, default_value_t = ModelSpec::All)]
    pub model: ModelSpec,

    /// Slope thresholds (cases/day) for sigmoid crossing times. Repeatable.
    #[arg(short = 't', long = "threshold")]
    pub thresholds: Vec<f64>,

    /// Year used to label day indices as calendar dates.
    #[arg(long, default_value_t = 2020)]
    pub year: i32,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Options for inspecting a saved curve.
#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Curve JSON file produced by `epi fit --export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,

    /// Year used to label day indices as calendar dates.
    #[arg(long)]
    pub year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_with_repeated_thresholds() {
        let cli = Cli::try_parse_from([
            "epi", "fit", "--csv", "italy.csv", "-c", "intensive_care", "-m", "sigmoid", "-t", "1", "-t", "2.5",
            "--domain-lower", "-0.25", "--domain-upper", "3",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.model, ModelSpec::Sigmoid);
        assert_eq!(args.thresholds, vec![1.0, 2.5]);
        assert_eq!(args.x_column, "day");
        assert_eq!(args.engine.domain_lower, Some(-0.25));
        assert_eq!(args.engine.domain_upper, Some(3.0));
    }

    #[test]
    fn parses_loss_names() {
        let cli = Cli::try_parse_from(["epi", "demo", "--loss", "soft-l1", "--max-iter", "50"]).unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.engine.loss, Some(LossKind::SoftL1));
        assert_eq!(args.engine.max_iterations, Some(50));
        assert!(!args.synthetic);
    }
}
