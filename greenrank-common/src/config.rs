//! Configuration loading and validation for the greenrank pipeline
//!
//! Two-tier configuration:
//! 1. **Built-in defaults**: defined in code, always valid.
//! 2. **TOML file**: optional overrides, resolved CLI argument →
//!    `GREENRANK_CONFIG` environment variable → OS config directory.
//!
//! A missing TOML file is never fatal: the loader warns and starts with
//! built-in defaults. An *invalid* configuration (weights that do not sum
//! to 1.0, an empty carbon-intensity table, out-of-range defaults) is
//! rejected at load time, before any batch is processed.

use crate::records::Field;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Weight split for the composite green score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Weight of the emissions (tCO2e, lower-better) sub-score
    pub emissions: f64,
    /// Weight of the intensity (g/1k tokens, lower-better) sub-score
    pub intensity: f64,
    /// Weight of the utilization (higher-better) sub-score
    pub utilization: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            emissions: 0.4,
            intensity: 0.4,
            utilization: 0.2,
        }
    }
}

impl RankingWeights {
    pub fn sum(&self) -> f64 {
        self.emissions + self.intensity + self.utilization
    }
}

/// Quality-score penalty applied per imputed field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationPenalties {
    pub gpu_hours: f64,
    pub energy_kwh: f64,
    pub tokens: f64,
    pub api_calls: f64,
    pub pue: f64,
    pub utilization: f64,
}

impl Default for ImputationPenalties {
    fn default() -> Self {
        Self {
            gpu_hours: 5.0,
            energy_kwh: 15.0,
            tokens: 5.0,
            api_calls: 5.0,
            pue: 5.0,
            utilization: 5.0,
        }
    }
}

impl ImputationPenalties {
    /// Penalty for imputing the given field. Identity fields are never
    /// imputed, so they carry no penalty.
    pub fn penalty_for(&self, field: Field) -> f64 {
        match field {
            Field::GpuHours => self.gpu_hours,
            Field::EnergyKwh => self.energy_kwh,
            Field::Tokens => self.tokens,
            Field::ApiCalls => self.api_calls,
            Field::Pue => self.pue,
            Field::Utilization => self.utilization,
            Field::Company | Field::Month | Field::Region => 0.0,
        }
    }

    fn all(&self) -> [f64; 6] {
        [
            self.gpu_hours,
            self.energy_kwh,
            self.tokens,
            self.api_calls,
            self.pue,
            self.utilization,
        ]
    }
}

/// Runtime configuration consumed by the pipeline core.
///
/// Injected into components at construction; never read as ambient global
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum Planner escalations per record before Exhausted
    pub retry_cap: u32,
    /// Assumed draw per GPU hour, used to impute missing energy
    pub assumed_watts_per_gpu_hour: f64,
    /// Industry-default PUE applied when a record reports none
    pub default_pue: f64,
    /// Default utilization percentage; None means utilization cannot be
    /// imputed and stays unresolved when missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_utilization: Option<f64>,
    /// Market-average intensity for regions absent from the table
    pub fallback_intensity_g_per_kwh: f64,
    /// Grid carbon intensity by uppercase region code (g CO2 per kWh)
    pub carbon_intensity_g_per_kwh: BTreeMap<String, f64>,
    pub imputation_penalties: ImputationPenalties,
    pub ranking_weights: RankingWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut intensity = BTreeMap::new();
        intensity.insert("US-EAST".to_string(), 350.0);
        intensity.insert("US-WEST".to_string(), 180.0);
        intensity.insert("CA-QC".to_string(), 25.0);
        intensity.insert("EU-NL".to_string(), 420.0);
        intensity.insert("EU-NO".to_string(), 15.0);
        intensity.insert("AP-SG".to_string(), 480.0);
        intensity.insert("AP-AU".to_string(), 750.0);

        Self {
            retry_cap: 3,
            assumed_watts_per_gpu_hour: 400.0,
            default_pue: 1.2,
            default_utilization: None,
            fallback_intensity_g_per_kwh: 400.0,
            carbon_intensity_g_per_kwh: intensity,
            imputation_penalties: ImputationPenalties::default(),
            ranking_weights: RankingWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject invalid configuration before any batch is processed.
    pub fn validate(&self) -> Result<()> {
        let weight_sum = self.ranking_weights.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "ranking weights must sum to 1.0, got {}",
                weight_sum
            )));
        }
        if self.assumed_watts_per_gpu_hour <= 0.0 {
            return Err(Error::Config(format!(
                "assumed_watts_per_gpu_hour must be positive, got {}",
                self.assumed_watts_per_gpu_hour
            )));
        }
        if self.default_pue < 1.0 {
            return Err(Error::Config(format!(
                "default_pue must be >= 1.0, got {}",
                self.default_pue
            )));
        }
        if let Some(u) = self.default_utilization {
            if !(0.0..=100.0).contains(&u) {
                return Err(Error::Config(format!(
                    "default_utilization must be in [0, 100], got {}",
                    u
                )));
            }
        }
        if self.carbon_intensity_g_per_kwh.is_empty() {
            return Err(Error::Config(
                "carbon intensity table must not be empty".to_string(),
            ));
        }
        for (region, g) in &self.carbon_intensity_g_per_kwh {
            if *g <= 0.0 {
                return Err(Error::Config(format!(
                    "carbon intensity for {} must be positive, got {}",
                    region, g
                )));
            }
        }
        if self.fallback_intensity_g_per_kwh <= 0.0 {
            return Err(Error::Config(format!(
                "fallback intensity must be positive, got {}",
                self.fallback_intensity_g_per_kwh
            )));
        }
        if self.imputation_penalties.all().iter().any(|p| *p < 0.0) {
            return Err(Error::Config(
                "imputation penalties must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Grid carbon intensity for a canonical region code, falling back to
    /// the configured market average for unknown regions.
    pub fn intensity_for_region(&self, region: &str) -> f64 {
        let key = region.trim().to_uppercase();
        match self.carbon_intensity_g_per_kwh.get(&key) {
            Some(g) => *g,
            None => self.fallback_intensity_g_per_kwh,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, logs to stderr if not specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Bootstrap configuration loaded from a TOML file.
///
/// Every section is optional; missing fields take built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Environment variable naming a config file path.
pub const CONFIG_ENV_VAR: &str = "GREENRANK_CONFIG";

/// Resolve the config file path: CLI argument → environment variable →
/// OS config directory (`<config>/greenrank/config.toml`).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("greenrank").join("config.toml"))
}

/// Load and validate configuration.
///
/// A missing file warns and falls back to built-in defaults; a present but
/// unparseable or invalid file is rejected.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let parsed: TomlConfig = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))?;
            info!("Configuration loaded from {}", path.display());
            parsed
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            TomlConfig::default()
        }
        None => {
            warn!("No config location available, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.pipeline.validate()?;
    Ok(config)
}
