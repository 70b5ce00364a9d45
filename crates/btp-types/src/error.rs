//! Error taxonomy for the quotation bounded context.
//!
//! Every failure mode of the devis engine maps to one variant with a
//! stable kind tag. Consumers switch on [`DevisError::kind`] rather than
//! on message text; the suggested transport mapping is NotFound -> 404,
//! conflict/state -> 409, validation -> 422, integration -> 502/500.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::statut::StatutDevis;

/// Errors raised by the quotation engine.
#[derive(Debug, Error)]
pub enum DevisError {
	// ── Not found ────────────────────────────────────────────────────
	#[error("Devis {devis_id} non trouve")]
	DevisNotFound { devis_id: i64 },
	#[error("Lot {lot_id} non trouve")]
	LotNotFound { lot_id: i64 },
	#[error("Ligne {ligne_id} non trouvee")]
	LigneNotFound { ligne_id: i64 },
	#[error("Article {article_id} non trouve")]
	ArticleNotFound { article_id: i64 },
	#[error("Aucune attestation TVA pour le devis {devis_id}")]
	AttestationNotFound { devis_id: i64 },
	#[error("Aucune signature pour le devis {devis_id}")]
	SignatureNotFound { devis_id: i64 },
	#[error("Frais de chantier {frais_id} non trouve")]
	FraisNotFound { frais_id: i64 },
	#[error("Comparatif {comparatif_id} non trouve")]
	ComparatifNotFound { comparatif_id: i64 },

	// ── Conflict / state ─────────────────────────────────────────────
	#[error("Le devis {devis_id} est en statut '{statut}' et ne peut pas etre modifie")]
	NonModifiable { devis_id: i64, statut: StatutDevis },
	#[error("Transition invalide: {de} -> {vers}")]
	TransitionInvalide { de: StatutDevis, vers: StatutDevis },
	#[error("Le devis {devis_id} a deja ete converti (chantier {chantier_ref})")]
	DejaConverti { devis_id: i64, chantier_ref: String },
	#[error("Le devis ne peut pas etre converti: {raison}")]
	NonConvertible { raison: String },
	#[error("Le devis {devis_id} possede deja une signature")]
	DejaSigne { devis_id: i64 },
	#[error("Le devis {devis_id} ne peut pas etre signe en statut '{statut}'")]
	NonSignable { devis_id: i64, statut: StatutDevis },
	#[error("Le devis {devis_id} est fige et ne peut pas etre modifie")]
	VersionFigee { devis_id: i64 },
	#[error("Une attestation TVA existe deja pour le devis {devis_id}")]
	AttestationDejaExistante { devis_id: i64 },

	// ── Validation ───────────────────────────────────────────────────
	#[error("{0}")]
	Validation(String),
	#[error("Attestation TVA invalide: {0}")]
	AttestationValidation(String),
	#[error("Frais de chantier invalide: {0}")]
	FraisValidation(String),
	#[error("Signature invalide: {0}")]
	SignatureValidation(String),
	#[error("Relance invalide: {0}")]
	RelanceValidation(String),
	#[error("Taux de TVA invalide: {taux}%. Valeurs autorisees: 0%, 5.5%, 10%, 20%")]
	TauxTvaInvalide { taux: Decimal },
	#[error("Taux de retenue de garantie invalide: {taux}%. Valeurs autorisees: 0, 5, 10%")]
	RetenueInvalide { taux: Decimal },
	#[error("Options de presentation invalides: {0}")]
	PresentationInvalide(String),
	#[error("Configuration de relances invalide: {0}")]
	ConfigRelancesInvalide(String),
	#[error("Transition '{transition}' non autorisee pour le role '{role}': {raison}")]
	TransitionNonAutorisee {
		role: String,
		transition: String,
		raison: String,
	},

	// ── Integration ──────────────────────────────────────────────────
	#[error("Erreur lors de la conversion: {0}")]
	Conversion(String),
	#[error("Erreur d'execution de relance: {0}")]
	RelanceExecution(String),
	#[error("Erreur de stockage: {0}")]
	Stockage(String),

	// ── Not eligible ─────────────────────────────────────────────────
	#[error("Le taux de TVA {taux}% ne necessite pas d'attestation")]
	TvaNonEligible { taux: Decimal },
}

impl DevisError {
	/// Returns the stable kind tag of this error.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::DevisNotFound { .. } => "devis_not_found",
			Self::LotNotFound { .. } => "lot_not_found",
			Self::LigneNotFound { .. } => "ligne_not_found",
			Self::ArticleNotFound { .. } => "article_not_found",
			Self::AttestationNotFound { .. } => "attestation_tva_not_found",
			Self::SignatureNotFound { .. } => "signature_not_found",
			Self::FraisNotFound { .. } => "frais_chantier_not_found",
			Self::ComparatifNotFound { .. } => "comparatif_not_found",
			Self::NonModifiable { .. } => "devis_not_modifiable",
			Self::TransitionInvalide { .. } => "transition_statut_invalide",
			Self::DejaConverti { .. } => "devis_deja_converti",
			Self::NonConvertible { .. } => "devis_non_convertible",
			Self::DejaSigne { .. } => "devis_deja_signe",
			Self::NonSignable { .. } => "devis_non_signable",
			Self::VersionFigee { .. } => "version_figee",
			Self::AttestationDejaExistante { .. } => "attestation_tva_deja_existante",
			Self::Validation(_) => "devis_validation",
			Self::AttestationValidation(_) => "attestation_tva_validation",
			Self::FraisValidation(_) => "frais_chantier_validation",
			Self::SignatureValidation(_) => "signature_devis_validation",
			Self::RelanceValidation(_) => "relance_devis_validation",
			Self::TauxTvaInvalide { .. } => "taux_tva_invalide",
			Self::RetenueInvalide { .. } => "retenue_garantie_invalide",
			Self::PresentationInvalide(_) => "options_presentation_invalide",
			Self::ConfigRelancesInvalide(_) => "config_relances_invalide",
			Self::TransitionNonAutorisee { .. } => "transition_non_autorisee",
			Self::Conversion(_) => "conversion",
			Self::RelanceExecution(_) => "relance_devis_execution",
			Self::Stockage(_) => "stockage",
			Self::TvaNonEligible { .. } => "tva_non_eligible",
		}
	}

	/// True for the not-found family (transport mapping 404).
	pub fn est_not_found(&self) -> bool {
		matches!(
			self,
			Self::DevisNotFound { .. }
				| Self::LotNotFound { .. }
				| Self::LigneNotFound { .. }
				| Self::ArticleNotFound { .. }
				| Self::AttestationNotFound { .. }
				| Self::SignatureNotFound { .. }
				| Self::FraisNotFound { .. }
				| Self::ComparatifNotFound { .. }
		)
	}
}
