//! Planner session configuration.
//!
//! # Responsibility
//! - Hold the tunables a host can persist next to its own settings.
//!
//! # Invariants
//! - A validated config always has a non-blank default unit name and a
//!   non-empty color palette.

use crate::model::unit::{DEFAULT_UNIT_NAME, UNIT_COLOR_PALETTE};
use crate::service::half_term_service::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    EmptyPalette,
    BlankDefaultUnitName,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid planner config: {err}"),
            Self::EmptyPalette => write!(f, "unit color palette must not be empty"),
            Self::BlankDefaultUnitName => write!(f, "default unit name must not be blank"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerConfig {
    /// What committing a lesson already held by another half-term does.
    pub conflict_policy: ConflictPolicy,
    pub default_unit_name: String,
    /// Colors assigned to new units in rotation.
    pub palette: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            default_unit_name: DEFAULT_UNIT_NAME.to_string(),
            palette: UNIT_COLOR_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl PlannerConfig {
    /// Parses and validates a JSON config; absent fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.palette.iter().all(|color| color.trim().is_empty()) {
            return Err(ConfigError::EmptyPalette);
        }
        if self.default_unit_name.trim().is_empty() {
            return Err(ConfigError::BlankDefaultUnitName);
        }
        Ok(())
    }

    /// Palette color for the `n`-th unit, wrapping around.
    pub fn palette_color(&self, n: usize) -> &str {
        if self.palette.is_empty() {
            return UNIT_COLOR_PALETTE[n % UNIT_COLOR_PALETTE.len()];
        }
        &self.palette[n % self.palette.len()]
    }
}
