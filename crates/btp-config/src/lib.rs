//! Configuration module for the BTP back-office core.
//!
//! Loads the tunable business constants from a TOML file and validates
//! them before the core starts. A missing file falls back to the
//! defaults, which carry the standard French BTP values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		Self::Parse(err.message().to_string())
	}
}

/// Quotation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevisConfig {
	/// Default global margin, percent.
	pub taux_marge_defaut: Decimal,
	/// Default overhead coefficient, percent.
	pub coefficient_frais_generaux: Decimal,
	/// Default VAT rate, percent.
	pub taux_tva_defaut: Decimal,
	/// HT amount above which validation requires admin.
	pub seuil_validation_direction: Decimal,
	/// Relance delays in days, strictly increasing.
	pub delais_relances: Vec<u32>,
	/// Default relance channel: email, push or email_push.
	pub type_relance_defaut: String,
}

impl Default for DevisConfig {
	fn default() -> Self {
		Self {
			taux_marge_defaut: Decimal::from(15),
			coefficient_frais_generaux: Decimal::from(12),
			taux_tva_defaut: Decimal::from(20),
			seuil_validation_direction: Decimal::from(50_000),
			delais_relances: vec![7, 15, 30],
			type_relance_defaut: "email".into(),
		}
	}
}

/// Workload planner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
	/// Working hours per week (35-hour basis).
	pub heures_par_semaine: f64,
	/// Working hours per day, used by the man-day conversion.
	pub heures_par_jour: f64,
}

impl Default for PlanningConfig {
	fn default() -> Self {
		Self {
			heures_par_semaine: 35.0,
			heures_par_jour: 7.0,
		}
	}
}

/// Full core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
	pub devis: DevisConfig,
	pub planning: PlanningConfig,
}

impl CoreConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml(contenu: &str) -> Result<Self, ConfigError> {
		let config: CoreConfig = toml::from_str(contenu)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads a configuration file; a missing file yields the defaults.
	pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		if !path.exists() {
			tracing::debug!(chemin = %path.display(), "configuration absente, defauts appliques");
			return Ok(Self::default());
		}
		let contenu = tokio::fs::read_to_string(path).await?;
		Self::from_toml(&contenu)
	}

	/// Checks every invariant of the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let devis = &self.devis;
		if devis.taux_marge_defaut < Decimal::ZERO {
			return Err(ConfigError::Validation(
				"devis.taux_marge_defaut must not be negative".into(),
			));
		}
		if devis.coefficient_frais_generaux < Decimal::ZERO {
			return Err(ConfigError::Validation(
				"devis.coefficient_frais_generaux must not be negative".into(),
			));
		}
		if devis.taux_tva_defaut < Decimal::ZERO || devis.taux_tva_defaut > Decimal::ONE_HUNDRED
		{
			return Err(ConfigError::Validation(
				"devis.taux_tva_defaut must lie in 0..=100".into(),
			));
		}
		if devis.seuil_validation_direction <= Decimal::ZERO {
			return Err(ConfigError::Validation(
				"devis.seuil_validation_direction must be positive".into(),
			));
		}
		if devis.delais_relances.is_empty() {
			return Err(ConfigError::Validation(
				"devis.delais_relances must not be empty".into(),
			));
		}
		if devis.delais_relances.iter().any(|d| *d < 1) {
			return Err(ConfigError::Validation(
				"devis.delais_relances entries must be >= 1 day".into(),
			));
		}
		if devis.delais_relances.windows(2).any(|w| w[0] >= w[1]) {
			return Err(ConfigError::Validation(
				"devis.delais_relances must be strictly increasing".into(),
			));
		}
		if !["email", "push", "email_push"].contains(&devis.type_relance_defaut.as_str()) {
			return Err(ConfigError::Validation(format!(
				"devis.type_relance_defaut '{}' is not one of email, push, email_push",
				devis.type_relance_defaut
			)));
		}

		let planning = &self.planning;
		if planning.heures_par_semaine <= 0.0 {
			return Err(ConfigError::Validation(
				"planning.heures_par_semaine must be positive".into(),
			));
		}
		if planning.heures_par_jour <= 0.0 {
			return Err(ConfigError::Validation(
				"planning.heures_par_jour must be positive".into(),
			));
		}
		if planning.heures_par_jour > planning.heures_par_semaine {
			return Err(ConfigError::Validation(
				"planning.heures_par_jour cannot exceed planning.heures_par_semaine".into(),
			));
		}
		Ok(())
	}
}
