//! Error taxonomy of the planning module.

use thiserror::Error;

/// Errors raised by the workload planner.
#[derive(Debug, Error)]
pub enum PlanningError {
	#[error("Besoin {besoin_id} non trouve")]
	BesoinNotFound { besoin_id: i64 },
	#[error(
		"Un besoin existe deja pour le chantier {chantier_id}, \
		 la semaine {semaine} et le metier {metier}"
	)]
	BesoinAlreadyExists {
		chantier_id: i64,
		semaine: String,
		metier: String,
	},
	#[error("Plage de semaines invalide: {0}")]
	InvalidSemaineRange(String),
	#[error("Code semaine invalide: {0}")]
	SemaineInvalide(String),
	#[error("Type de metier invalide: {0}")]
	TypeMetierInvalide(String),
	#[error("{0}")]
	Validation(String),
	#[error("Transition '{action}' non autorisee pour le role '{role}'")]
	NonAutorise { role: String, action: String },
	#[error("Erreur de stockage: {0}")]
	Stockage(String),
}

impl PlanningError {
	/// Stable kind tag of this error.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::BesoinNotFound { .. } => "besoin_not_found",
			Self::BesoinAlreadyExists { .. } => "besoin_already_exists",
			Self::InvalidSemaineRange(_) => "invalid_semaine_range",
			Self::SemaineInvalide(_) => "semaine_invalide",
			Self::TypeMetierInvalide(_) => "type_metier_invalide",
			Self::Validation(_) => "planning_validation",
			Self::NonAutorise { .. } => "transition_non_autorisee",
			Self::Stockage(_) => "stockage",
		}
	}
}
