//! Configuration loading and typed config structures for the fishery simulation.
//!
//! The canonical scenario lives in `fishery-scenario.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file. Every section has
//! defaults, so an empty document is a valid (if uneventful) scenario.
//!
//! Semantic validation of the regulation section (empty quota maps,
//! negative quotas, non-positive lot sizes) happens when the regulation
//! factory is applied, not here.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use fishery_types::{PricingPolicy, RegulationKind};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed correctly but is out of range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level scenario configuration.
///
/// Mirrors the structure of `fishery-scenario.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed).
    #[serde(default)]
    pub world: WorldConfig,

    /// Step length and calendar anchor.
    #[serde(default)]
    pub time: TimeConfig,

    /// Run bounds.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Species landed in this scenario, in index order.
    #[serde(default = "default_species")]
    pub species: Vec<SpeciesConfig>,

    /// Fisher population parameters.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Regulation regime.
    #[serde(default)]
    pub regulation: RegulationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            time: TimeConfig::default(),
            simulation: SimulationBoundsConfig::default(),
            logging: LoggingConfig::default(),
            species: default_species(),
            population: PopulationConfig::default(),
            regulation: RegulationConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time.steps_per_day == 0 {
            return Err(ConfigError::Invalid {
                field: "time.steps_per_day",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.species.iter().any(|s| s.price < Decimal::ZERO) {
            return Err(ConfigError::Invalid {
                field: "species.price",
                reason: "prices cannot be negative".to_owned(),
            });
        }
        if self.population.daily_catch.values().any(|kg| *kg < Decimal::ZERO) {
            return Err(ConfigError::Invalid {
                field: "population.daily_catch",
                reason: "catches cannot be negative".to_owned(),
            });
        }
        let spread = self.population.catch_spread;
        if spread < Decimal::ZERO || spread > Decimal::ONE {
            return Err(ConfigError::Invalid {
                field: "population.catch_spread",
                reason: "must be between 0 and 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable scenario name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
        }
    }
}

/// Time configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeConfig {
    /// Number of scheduler steps in one simulated day.
    #[serde(default = "default_steps_per_day")]
    pub steps_per_day: u32,

    /// Calendar date of step 0.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            steps_per_day: default_steps_per_day(),
            start_date: default_start_date(),
        }
    }
}

/// Simulation boundary configuration.
///
/// A value of 0 for either bound means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Maximum number of simulated years (0 = unlimited).
    #[serde(default = "default_max_years")]
    pub max_years: u32,

    /// Maximum number of steps (0 = unlimited).
    #[serde(default)]
    pub max_steps: u64,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_years: default_max_years(),
            max_steps: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit one JSON object per event instead of human-readable lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// One species entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeciesConfig {
    /// Species name; quota maps refer to species by this name.
    pub name: String,

    /// Fixed ex-vessel price per kg.
    #[serde(default)]
    pub price: Decimal,
}

/// Fisher population configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PopulationConfig {
    /// Number of fishers created at population time.
    #[serde(default = "default_fishers")]
    pub fishers: u32,

    /// Kilograms each fisher brings in per day, by species name.
    #[serde(default)]
    pub daily_catch: BTreeMap<String, Decimal>,

    /// Fraction added to or taken from the species price when a fisher
    /// prices a quota request or offer (0.1 = 10%).
    #[serde(default = "default_trading_markup")]
    pub trading_markup: Decimal,

    /// Largest relative deviation of one fisher's catch from `daily_catch`
    /// (0.25 = each fisher lands between 75% and 125%). Drawn once per
    /// fisher from the run's seeded RNG.
    #[serde(default)]
    pub catch_spread: Decimal,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            fishers: default_fishers(),
            daily_catch: BTreeMap::new(),
            trading_markup: default_trading_markup(),
            catch_spread: Decimal::ZERO,
        }
    }
}

/// Regulation regime configuration.
///
/// Which fields matter depends on `kind`: the mono kinds read
/// `yearly_quota`, the multi-species kinds read `yearly_quotas`, and only
/// `itq` reads the trading fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegulationConfig {
    /// Which regime to build.
    #[serde(default)]
    pub kind: RegulationKind,

    /// Yearly quota for `mono_tac` / `mono_iq`.
    #[serde(default)]
    pub yearly_quota: Option<Decimal>,

    /// Aggregate yearly quota per species name for `tac` / `iq` / `itq`.
    #[serde(default)]
    pub yearly_quotas: BTreeMap<String, Decimal>,

    /// Lot size per species name; species not listed use `default_lot_size`.
    #[serde(default)]
    pub lot_sizes: BTreeMap<String, Decimal>,

    /// Lot size for species without an explicit entry.
    #[serde(default = "default_lot_size")]
    pub default_lot_size: Decimal,

    /// Whether a fisher may trade more than once per clearing.
    #[serde(default)]
    pub allow_multiple_trades: bool,

    /// How matched lots are priced.
    #[serde(default)]
    pub pricing: PricingPolicy,

    /// Clearings a buyer must sit out before offering quota again.
    #[serde(default)]
    pub penalty_days: u32,

    /// First simulated year in which order books clear.
    #[serde(default)]
    pub implementation_year: u32,
}

impl Default for RegulationConfig {
    fn default() -> Self {
        Self {
            kind: RegulationKind::default(),
            yearly_quota: None,
            yearly_quotas: BTreeMap::new(),
            lot_sizes: BTreeMap::new(),
            default_lot_size: default_lot_size(),
            allow_multiple_trades: false,
            pricing: PricingPolicy::default(),
            penalty_days: 0,
            implementation_year: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Unnamed Fishery".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_steps_per_day() -> u32 {
    1
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

const fn default_max_years() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_species() -> Vec<SpeciesConfig> {
    vec![SpeciesConfig {
        name: "Species 0".to_owned(),
        price: Decimal::TEN,
    }]
}

const fn default_fishers() -> u32 {
    100
}

fn default_trading_markup() -> Decimal {
    Decimal::new(1, 1)
}

const fn default_lot_size() -> Decimal {
    Decimal::ONE_HUNDRED
}
