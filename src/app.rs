//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging and `.env` configuration
//! - parses CLI arguments
//! - loads series (CSV or built-in samples)
//! - runs the fits
//! - prints reports and writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{BatchArgs, Command, DemoArgs, EngineArgs, FitArgs, InspectArgs};
use crate::domain::{CurveDomain, FitConfig, LossKind};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `epi` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Demo(args) => handle_demo(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config(&args.engine)?;
    let data = crate::io::load_series(&args.csv, &args.x_column, std::slice::from_ref(&args.column))?;
    let Some(series) = data.series.into_iter().next() else {
        return Err(AppError::new(2, format!("Column '{}' produced no series.", args.column)));
    };
    info!(
        "loaded '{}' from {} ({} rows, {} usable)",
        series.name,
        args.csv.display(),
        data.rows_read,
        series.len()
    );

    let runs = pipeline::fit_series(&series, &args.model.families(), &config, &args.thresholds)?;

    print!("{}", crate::report::format_series_header(&series));
    for run in &runs {
        print!("{}", crate::report::format_fit(&run.fit, &run.points, args.year));
    }
    let fits: Vec<_> = runs.iter().map(|r| r.fit.clone()).collect();
    print!("{}", crate::report::format_comparison(&fits));

    if let Some(path) = &args.export_curve {
        pipeline::export_curves(path, &runs)?;
    }
    if let Some(path) = &args.export_residuals {
        crate::io::write_residuals_csv(path, &series, &fits)?;
        info!("wrote residuals to {}", path.display());
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = fit_config(&args.engine)?;
    let data = crate::io::load_series(&args.csv, &args.x_column, &args.columns)?;
    info!(
        "loaded {} series from {} ({} rows)",
        data.series.len(),
        args.csv.display(),
        data.rows_read
    );

    let results = crate::fit::fit_batch(&data.series, &args.model.families(), &config);
    print!("{}", crate::report::format_batch_table(&results));

    if results.iter().all(|r| !r.is_ok()) {
        return Err(AppError::new(4, "Every fit in the batch failed."));
    }
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = fit_config(&args.engine)?;
    let series = if args.synthetic {
        let noise = crate::data::noise_spec(args.noise, args.seed)?;
        crate::data::synthetic_outbreak("synthetic", 40..120, 75.0, 20.0, 15_000.0, 0.12, noise)
    } else {
        crate::data::reference_series()
    };

    let runs = pipeline::fit_series(&series, &args.model.families(), &config, &args.thresholds)?;

    print!("{}", crate::report::format_series_header(&series));
    for run in &runs {
        print!("{}", crate::report::format_fit(&run.fit, &run.points, Some(args.year)));
    }
    let fits: Vec<_> = runs.iter().map(|r| r.fit.clone()).collect();
    print!("{}", crate::report::format_comparison(&fits));
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let curve = crate::io::read_curve_json(&args.curve)?;
    print!("{}", crate::report::format_curve_file(&curve, args.year));
    Ok(())
}

/// Resolve engine settings: built-in defaults, then `EPI_*` variables, then CLI flags.
pub fn fit_config(args: &EngineArgs) -> Result<FitConfig, AppError> {
    let mut config = config_from_env(|key| std::env::var(key).ok())?;

    if let Some(v) = args.norm_lower {
        config.norm_lower = v;
    }
    if let Some(v) = args.norm_upper {
        config.norm_upper = v;
    }
    match (args.domain_lower, args.domain_upper) {
        (Some(lower), Some(upper)) => config.domain = Some(CurveDomain { lower, upper }),
        (None, None) => {}
        _ => {
            return Err(AppError::new(
                2,
                "--domain-lower and --domain-upper must be given together.",
            ));
        }
    }
    if let Some(v) = args.curve_points {
        config.curve_points = v;
    }
    if let Some(v) = args.loss {
        config.loss = v;
    }
    if let Some(v) = args.loss_scale {
        config.loss_scale = v;
    }
    if let Some(v) = args.max_iterations {
        config.max_iterations = v;
    }

    config.validate()?;
    Ok(config)
}

/// Apply `EPI_*` overrides on top of the defaults.
///
/// `lookup` abstracts the environment so tests don't have to mutate process state.
pub fn config_from_env<F>(lookup: F) -> Result<FitConfig, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
        raw.trim()
            .parse()
            .map_err(|_| AppError::new(2, format!("Invalid value for {key}: '{raw}'.")))
    }

    let mut config = FitConfig::default();
    if let Some(raw) = lookup("EPI_NORM_LOWER") {
        config.norm_lower = parse("EPI_NORM_LOWER", &raw)?;
    }
    if let Some(raw) = lookup("EPI_NORM_UPPER") {
        config.norm_upper = parse("EPI_NORM_UPPER", &raw)?;
    }
    if let Some(raw) = lookup("EPI_CURVE_POINTS") {
        config.curve_points = parse("EPI_CURVE_POINTS", &raw)?;
    }
    if let Some(raw) = lookup("EPI_LOSS") {
        config.loss = raw.parse::<LossKind>()?;
    }
    if let Some(raw) = lookup("EPI_LOSS_SCALE") {
        config.loss_scale = parse("EPI_LOSS_SCALE", &raw)?;
    }
    if let Some(raw) = lookup("EPI_MAX_ITER") {
        config.max_iterations = parse("EPI_MAX_ITER", &raw)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = config_from_env(env(&[("EPI_CURVE_POINTS", "200"), ("EPI_LOSS", "huber")])).unwrap();
        assert_eq!(config.curve_points, 200);
        assert_eq!(config.loss, LossKind::Huber);
        assert_eq!(config.norm_lower, 0.3);
    }

    #[test]
    fn bad_env_value_is_a_config_error() {
        let err = config_from_env(env(&[("EPI_MAX_ITER", "many")])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("EPI_MAX_ITER"));
    }

    #[test]
    fn half_a_domain_is_rejected() {
        let args = EngineArgs {
            domain_lower: Some(-1.0),
            ..EngineArgs::default()
        };
        assert!(fit_config(&args).is_err());
    }
}
