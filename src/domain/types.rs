//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for inspection or plotting

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Parametric curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// `y = e^{k(x-x0)} + y0`
    Exponential,
    /// `y = c / (1 + e^{-k(x-x0)}) + y0`
    Sigmoid,
    /// `y = c·k·e^{-k(x-x0)} / (1 + e^{-k(x-x0)})^2 + y0`
    LogisticDistribution,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Exponential,
        ModelFamily::Sigmoid,
        ModelFamily::LogisticDistribution,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelFamily::Exponential => "Exponential",
            ModelFamily::Sigmoid => "Sigmoid",
            ModelFamily::LogisticDistribution => "Logistic distribution",
        }
    }

    /// Stable machine name; matches the serde representation.
    pub fn slug(self) -> &'static str {
        match self {
            ModelFamily::Exponential => "exponential",
            ModelFamily::Sigmoid => "sigmoid",
            ModelFamily::LogisticDistribution => "logistic_distribution",
        }
    }

    /// Parameter names in solver order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelFamily::Exponential => &["x0", "y0", "k"],
            ModelFamily::Sigmoid | ModelFamily::LogisticDistribution => &["x0", "y0", "c", "k"],
        }
    }

    /// Number of free parameters.
    pub fn param_count(self) -> usize {
        match self {
            ModelFamily::Exponential => 3,
            ModelFamily::Sigmoid | ModelFamily::LogisticDistribution => 4,
        }
    }

    /// Default dense-curve domain in normalized x.
    ///
    /// Data occupies `[0.3, 1.0]` after normalization. Every family starts at
    /// `-0.5`; growth curves are only trusted for a short lookahead, saturating
    /// curves are extended further.
    pub fn default_domain(self) -> CurveDomain {
        match self {
            ModelFamily::Exponential => CurveDomain {
                lower: -0.5,
                upper: 1.25,
            },
            ModelFamily::Sigmoid | ModelFamily::LogisticDistribution => CurveDomain {
                lower: -0.5,
                upper: 2.5,
            },
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Which family (or families) a CLI run should fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    Exponential,
    Sigmoid,
    Logistic,
    /// Fit every family side by side. No selection is made; the report lists
    /// the residual spread of each so the caller can compare.
    All,
}

impl ModelSpec {
    pub fn families(self) -> Vec<ModelFamily> {
        match self {
            ModelSpec::Exponential => vec![ModelFamily::Exponential],
            ModelSpec::Sigmoid => vec![ModelFamily::Sigmoid],
            ModelSpec::Logistic => vec![ModelFamily::LogisticDistribution],
            ModelSpec::All => ModelFamily::ALL.to_vec(),
        }
    }
}

/// Loss applied to residuals by the least-squares solver.
///
/// With `z = (r / scale)^2`:
/// - `linear`:  `ρ(z) = z`
/// - `soft-l1`: `ρ(z) = 2(√(1+z) - 1)`
/// - `huber`:   `ρ(z) = z` for `z ≤ 1`, else `2√z - 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LossKind {
    Linear,
    SoftL1,
    Huber,
}

impl std::str::FromStr for LossKind {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(LossKind::Linear),
            "soft-l1" | "soft_l1" | "softl1" => Ok(LossKind::SoftL1),
            "huber" => Ok(LossKind::Huber),
            other => Err(FitError::InvalidInput(format!("Unknown loss '{other}'."))),
        }
    }
}

/// Span of the dense prediction curve, in normalized x units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveDomain {
    pub lower: f64,
    pub upper: f64,
}

/// Engine configuration.
///
/// Every tunable of a fit lives here so callers (CLI, batch jobs, tests) pass
/// it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    /// Lower bound of the normalization interval (both axes).
    pub norm_lower: f64,
    /// Upper bound of the normalization interval (both axes).
    pub norm_upper: f64,
    /// Dense-curve domain; `None` uses [`ModelFamily::default_domain`].
    pub domain: Option<CurveDomain>,
    /// Number of points in the dense prediction curve.
    pub curve_points: usize,

    pub loss: LossKind,
    /// Residual scale at which the robust loss starts to flatten (normalized y units).
    pub loss_scale: f64,

    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Gradient (infinity norm) tolerance.
    pub gtol: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            norm_lower: 0.3,
            norm_upper: 1.0,
            domain: None,
            curve_points: 1500,
            loss: LossKind::SoftL1,
            loss_scale: 0.1,
            max_iterations: 500,
            ftol: 1e-12,
            xtol: 1e-10,
            gtol: 1e-12,
        }
    }
}

impl FitConfig {
    pub fn domain_for(&self, family: ModelFamily) -> CurveDomain {
        self.domain.unwrap_or_else(|| family.default_domain())
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.norm_lower.is_finite() && self.norm_upper.is_finite())
            || self.norm_lower == self.norm_upper
        {
            return Err(FitError::InvalidInput(format!(
                "Invalid normalization interval [{}, {}].",
                self.norm_lower, self.norm_upper
            )));
        }
        if let Some(d) = self.domain {
            if !(d.lower.is_finite() && d.upper.is_finite() && d.upper > d.lower) {
                return Err(FitError::InvalidInput(format!(
                    "Invalid curve domain [{}, {}].",
                    d.lower, d.upper
                )));
            }
        }
        if self.curve_points < 2 {
            return Err(FitError::InvalidInput("Curve points must be >= 2.".into()));
        }
        if !(self.loss_scale.is_finite() && self.loss_scale > 0.0) {
            return Err(FitError::InvalidInput(format!(
                "Loss scale must be finite and > 0, got {}.",
                self.loss_scale
            )));
        }
        if self.max_iterations == 0 {
            return Err(FitError::InvalidInput("Max iterations must be > 0.".into()));
        }
        Ok(())
    }
}

/// A named `(x, y)` series: x is a day index, y a non-negative count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, checking that both axes line up and are finite.
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if x.len() != y.len() {
            return Err(FitError::InvalidInput(format!(
                "Series '{name}': x has {} values but y has {}.",
                x.len(),
                y.len()
            )));
        }
        if let Some(i) = x.iter().zip(y.iter()).position(|(a, b)| !(a.is_finite() && b.is_finite())) {
            return Err(FitError::InvalidInput(format!(
                "Series '{name}': non-finite value at index {i}."
            )));
        }
        Ok(Self { name, x, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialParams {
    pub x0: f64,
    pub y0: f64,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidParams {
    pub x0: f64,
    pub y0: f64,
    pub c: f64,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    pub x0: f64,
    pub y0: f64,
    pub c: f64,
    pub k: f64,
}

/// Fitted parameters in original (denormalized) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelParameters {
    Exponential(ExponentialParams),
    Sigmoid(SigmoidParams),
    LogisticDistribution(LogisticParams),
}

impl ModelParameters {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelParameters::Exponential(_) => ModelFamily::Exponential,
            ModelParameters::Sigmoid(_) => ModelFamily::Sigmoid,
            ModelParameters::LogisticDistribution(_) => ModelFamily::LogisticDistribution,
        }
    }

    /// Parameters in the solver's vector order (`[x0, y0, k]` or `[x0, y0, c, k]`).
    pub fn to_vec(&self) -> Vec<f64> {
        match *self {
            ModelParameters::Exponential(p) => vec![p.x0, p.y0, p.k],
            ModelParameters::Sigmoid(p) => vec![p.x0, p.y0, p.c, p.k],
            ModelParameters::LogisticDistribution(p) => vec![p.x0, p.y0, p.c, p.k],
        }
    }

    /// Rebuild from the solver's vector order.
    pub fn from_slice(family: ModelFamily, p: &[f64]) -> Result<Self> {
        if p.len() != family.param_count() {
            return Err(FitError::InvalidInput(format!(
                "{family} expects {} parameters, got {}.",
                family.param_count(),
                p.len()
            )));
        }
        Ok(match family {
            ModelFamily::Exponential => ModelParameters::Exponential(ExponentialParams {
                x0: p[0],
                y0: p[1],
                k: p[2],
            }),
            ModelFamily::Sigmoid => ModelParameters::Sigmoid(SigmoidParams {
                x0: p[0],
                y0: p[1],
                c: p[2],
                k: p[3],
            }),
            ModelFamily::LogisticDistribution => {
                ModelParameters::LogisticDistribution(LogisticParams {
                    x0: p[0],
                    y0: p[1],
                    c: p[2],
                    k: p[3],
                })
            }
        })
    }

    /// Evaluate the curve at `x` (original units).
    pub fn evaluate(&self, x: f64) -> f64 {
        crate::models::predict(self.family(), x, &self.to_vec())
    }

    pub fn as_sigmoid(&self) -> Option<&SigmoidParams> {
        match self {
            ModelParameters::Sigmoid(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_logistic(&self) -> Option<&LogisticParams> {
        match self {
            ModelParameters::LogisticDistribution(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite())
    }
}

/// A dense prediction curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl CurveGrid {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(first x, last x)` of the grid, if non-empty.
    pub fn x_span(&self) -> Option<(f64, f64)> {
        Some((*self.x.first()?, *self.x.last()?))
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Relative cost reduction fell below `ftol`.
    Ftol,
    /// Relative step size fell below `xtol`.
    Xtol,
    /// Gradient fell below `gtol`.
    Gtol,
}

/// Solver diagnostics for a single fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub iterations: usize,
    /// Final robust cost in normalized space.
    pub cost: f64,
    pub termination: Termination,
}

/// Output of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub series: String,
    pub parameters: ModelParameters,
    pub curve: CurveGrid,
    /// `y - f(x)` at each observation, original units.
    pub residuals: Vec<f64>,
    /// Population standard deviation of `residuals`.
    pub residual_stddev: f64,
    pub diagnostics: FitDiagnostics,
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        self.parameters.family()
    }
}

/// Semantic tag of a derived point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Inflection,
    Peak,
    AsymptoteLower,
    AsymptoteUpper,
    ThresholdCrossing,
}

impl PointKind {
    pub fn label(self) -> &'static str {
        match self {
            PointKind::Inflection => "inflection",
            PointKind::Peak => "peak",
            PointKind::AsymptoteLower => "asymptote (lower)",
            PointKind::AsymptoteUpper => "asymptote (upper)",
            PointKind::ThresholdCrossing => "slope crossing",
        }
    }
}

/// An analytic point for plotting collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedPoint {
    pub kind: PointKind,
    pub x: f64,
    pub y: f64,
    /// Slope threshold for `threshold_crossing` points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl DerivedPoint {
    pub fn new(kind: PointKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            x,
            y,
            alpha: None,
        }
    }
}

/// A saved curve file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub series: String,
    pub parameters: ModelParameters,
    pub residual_stddev: f64,
    pub derived_points: Vec<DerivedPoint>,
    pub grid: CurveGrid,
}
