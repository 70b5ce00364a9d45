//! Quote entity.
//!
//! The quote is the root aggregate of the quotation engine. It carries
//! client identity, computed totals, margin parameters, the workflow
//! status, versioning fields and the relance configuration. The detailed
//! structure (lots, lines) lives in [`crate::lot::LotDevis`] and
//! [`crate::ligne::LigneDevis`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DevisError;
use crate::ligne::TypeDebourse;
use crate::presentation::OptionsPresentation;
use crate::relance::ConfigRelances;
use crate::statut::StatutDevis;
use crate::version::TypeVersion;

/// A commercial quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Devis {
	pub id: Option<i64>,
	/// Unique number `DEV-YYYY-NNN`, with `-R<n>` / `-<LABEL>` suffixes
	/// for revisions and variants.
	pub numero: String,
	pub client_nom: String,
	pub client_adresse: Option<String>,
	pub client_telephone: Option<String>,
	pub client_email: Option<String>,
	/// Reference of the work-site once converted.
	pub chantier_ref: Option<String>,
	pub objet: Option<String>,
	pub date_creation: Option<NaiveDate>,
	pub date_validite: Option<NaiveDate>,
	pub statut: StatutDevis,

	// Computed totals, refreshed by the recompute use case
	pub montant_total_ht: Decimal,
	pub montant_total_ttc: Decimal,
	pub debourse_sec_total: Decimal,

	// Margin parameters
	pub taux_marge_global: Decimal,
	pub coefficient_frais_generaux: Decimal,
	pub taux_tva_defaut: Decimal,
	pub retenue_garantie_pct: Decimal,

	// Per-discharge-kind margins (precedence 3 in the hierarchy)
	pub taux_marge_moe: Option<Decimal>,
	pub taux_marge_materiaux: Option<Decimal>,
	pub taux_marge_sous_traitance: Option<Decimal>,
	pub taux_marge_materiel: Option<Decimal>,
	pub taux_marge_deplacement: Option<Decimal>,

	pub notes: Option<String>,
	pub conditions_generales: Option<String>,

	// Versioning
	pub devis_parent_id: Option<i64>,
	pub numero_version: i32,
	pub type_version: TypeVersion,
	pub label_variante: Option<String>,
	pub version_commentaire: Option<String>,
	pub version_figee: bool,
	pub figee_at: Option<DateTime<Utc>>,
	pub figee_par: Option<i64>,

	// Presentation + relances
	pub options_presentation: OptionsPresentation,
	pub config_relances: ConfigRelances,

	// User references. Both the commercial and the site manager are
	// persisted on the quote.
	pub commercial_id: Option<i64>,
	pub conducteur_id: Option<i64>,
	pub created_by: Option<i64>,

	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
	pub deleted_at: Option<DateTime<Utc>>,
	pub deleted_by: Option<i64>,
}

impl Devis {
	/// Builds a validated quote in `Brouillon` status.
	pub fn new(numero: impl Into<String>, client_nom: impl Into<String>) -> Result<Self, DevisError> {
		let devis = Self {
			id: None,
			numero: numero.into(),
			client_nom: client_nom.into(),
			client_adresse: None,
			client_telephone: None,
			client_email: None,
			chantier_ref: None,
			objet: None,
			date_creation: None,
			date_validite: None,
			statut: StatutDevis::initial(),
			montant_total_ht: Decimal::ZERO,
			montant_total_ttc: Decimal::ZERO,
			debourse_sec_total: Decimal::ZERO,
			taux_marge_global: Decimal::from(15),
			coefficient_frais_generaux: Decimal::from(12),
			taux_tva_defaut: Decimal::from(20),
			retenue_garantie_pct: Decimal::ZERO,
			taux_marge_moe: None,
			taux_marge_materiaux: None,
			taux_marge_sous_traitance: None,
			taux_marge_materiel: None,
			taux_marge_deplacement: None,
			notes: None,
			conditions_generales: None,
			devis_parent_id: None,
			numero_version: 1,
			type_version: TypeVersion::Originale,
			label_variante: None,
			version_commentaire: None,
			version_figee: false,
			figee_at: None,
			figee_par: None,
			options_presentation: OptionsPresentation::defaut(),
			config_relances: ConfigRelances::defaut(),
			commercial_id: None,
			conducteur_id: None,
			created_by: None,
			created_at: None,
			updated_at: None,
			deleted_at: None,
			deleted_by: None,
		};
		devis.valider()?;
		Ok(devis)
	}

	/// Re-checks the construction invariants after field edits.
	pub fn valider(&self) -> Result<(), DevisError> {
		if self.numero.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le numero du devis est obligatoire".into(),
			));
		}
		if self.client_nom.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le nom du client est obligatoire".into(),
			));
		}
		if self.taux_marge_global < Decimal::ZERO {
			return Err(DevisError::Validation(
				"Le taux de marge global ne peut pas etre negatif".into(),
			));
		}
		if self.coefficient_frais_generaux < Decimal::ZERO {
			return Err(DevisError::Validation(
				"Le coefficient de frais generaux ne peut pas etre negatif".into(),
			));
		}
		if self.taux_tva_defaut < Decimal::ZERO || self.taux_tva_defaut > Decimal::ONE_HUNDRED {
			return Err(DevisError::Validation(
				"Le taux de TVA par defaut doit etre entre 0 et 100%".into(),
			));
		}
		if self.retenue_garantie_pct < Decimal::ZERO
			|| self.retenue_garantie_pct > Decimal::ONE_HUNDRED
		{
			return Err(DevisError::Validation(
				"La retenue de garantie doit etre entre 0 et 100%".into(),
			));
		}
		if let (Some(creation), Some(validite)) = (self.date_creation, self.date_validite) {
			if validite < creation {
				return Err(DevisError::Validation(
					"La date de validite ne peut pas etre anterieure a la date de creation".into(),
				));
			}
		}
		Ok(())
	}

	/// Margin configured on the quote for a discharge kind, if any.
	pub fn taux_marge_pour_type(&self, type_debourse: TypeDebourse) -> Option<Decimal> {
		match type_debourse {
			TypeDebourse::Moe => self.taux_marge_moe,
			TypeDebourse::Materiaux => self.taux_marge_materiaux,
			TypeDebourse::SousTraitance => self.taux_marge_sous_traitance,
			TypeDebourse::Materiel => self.taux_marge_materiel,
			TypeDebourse::Deplacement => self.taux_marge_deplacement,
		}
	}

	pub fn est_modifiable(&self) -> bool {
		self.statut.est_modifiable() && !self.version_figee
	}

	pub fn est_supprime(&self) -> bool {
		self.deleted_at.is_some()
	}

	/// True when the validity date is in the past.
	pub fn est_expire(&self, aujourd_hui: NaiveDate) -> bool {
		self.date_validite.is_some_and(|d| aujourd_hui > d)
	}

	/// Fails unless the quote may be edited (status + frozen version).
	pub fn verifier_modifiable(&self) -> Result<(), DevisError> {
		if self.version_figee {
			return Err(DevisError::VersionFigee {
				devis_id: self.id.unwrap_or_default(),
			});
		}
		if !self.statut.est_modifiable() {
			return Err(DevisError::NonModifiable {
				devis_id: self.id.unwrap_or_default(),
				statut: self.statut,
			});
		}
		Ok(())
	}

	fn transitionner(&mut self, cible: StatutDevis) -> Result<(), DevisError> {
		self.statut = self.statut.transitionner_vers(cible)?;
		self.updated_at = Some(Utc::now());
		Ok(())
	}

	/// brouillon -> en_validation
	pub fn soumettre_validation(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::EnValidation)
	}

	/// en_validation -> brouillon
	pub fn retourner_brouillon(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Brouillon)
	}

	/// en_validation -> envoye
	pub fn envoyer(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Envoye)
	}

	/// envoye -> vu
	pub fn marquer_vu(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Vu)
	}

	/// envoye/vu/expire -> en_negociation
	pub fn passer_en_negociation(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::EnNegociation)
	}

	/// envoye/vu/en_negociation -> accepte
	pub fn accepter(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Accepte)
	}

	/// envoye/vu/en_negociation -> refuse
	pub fn refuser(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Refuse)
	}

	/// en_negociation -> perdu
	pub fn marquer_perdu(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Perdu)
	}

	/// envoye/vu -> expire
	pub fn marquer_expire(&mut self) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Expire)
	}

	/// accepte -> converti, recording the work-site reference.
	pub fn convertir(&mut self, chantier_ref: impl Into<String>) -> Result<(), DevisError> {
		self.transitionner(StatutDevis::Converti)?;
		self.chantier_ref = Some(chantier_ref.into());
		Ok(())
	}

	/// Rolls an accepted quote back to negotiation after a signature
	/// revocation. This edge exists only for revocation and bypasses the
	/// regular transition table.
	pub fn revoquer_acceptation(&mut self) -> Result<(), DevisError> {
		if self.statut != StatutDevis::Accepte {
			return Err(DevisError::TransitionInvalide {
				de: self.statut,
				vers: StatutDevis::EnNegociation,
			});
		}
		self.statut = StatutDevis::EnNegociation;
		self.updated_at = Some(Utc::now());
		Ok(())
	}

	/// Freezes this version; a frozen version rejects updates, deletes
	/// and further freezing.
	pub fn figer(&mut self, par: i64) -> Result<(), DevisError> {
		if self.version_figee {
			return Err(DevisError::Validation(format!(
				"La version {} est deja figee",
				self.numero
			)));
		}
		self.version_figee = true;
		self.figee_at = Some(Utc::now());
		self.figee_par = Some(par);
		self.updated_at = Some(Utc::now());
		Ok(())
	}

	/// Marks the quote soft-deleted. Only drafts may be deleted; frozen
	/// versions never are.
	pub fn supprimer(&mut self, deleted_by: i64) -> Result<(), DevisError> {
		if self.version_figee {
			return Err(DevisError::Validation(format!(
				"La version {} est figee et ne peut pas etre supprimee",
				self.numero
			)));
		}
		if self.statut != StatutDevis::Brouillon {
			return Err(DevisError::NonModifiable {
				devis_id: self.id.unwrap_or_default(),
				statut: self.statut,
			});
		}
		self.deleted_at = Some(Utc::now());
		self.deleted_by = Some(deleted_by);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn devis() -> Devis {
		Devis::new("DEV-2026-001", "Client Test").unwrap()
	}

	#[test]
	fn test_workflow_nominal() {
		let mut d = devis();
		d.soumettre_validation().unwrap();
		assert_eq!(d.statut, StatutDevis::EnValidation);
		d.retourner_brouillon().unwrap();
		assert_eq!(d.statut, StatutDevis::Brouillon);
		d.soumettre_validation().unwrap();
		d.envoyer().unwrap();
		assert_eq!(d.statut, StatutDevis::Envoye);
		d.accepter().unwrap();
		assert_eq!(d.statut, StatutDevis::Accepte);
		// A second accept is rejected
		let err = d.accepter().unwrap_err();
		assert_eq!(err.kind(), "transition_statut_invalide");
	}

	#[test]
	fn test_numero_obligatoire() {
		assert!(Devis::new("", "Client").is_err());
		assert!(Devis::new("DEV-2026-001", "  ").is_err());
	}

	#[test]
	fn test_dates_coherentes() {
		let mut d = devis();
		d.date_creation = Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
		d.date_validite = Some(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
		assert!(d.valider().is_err());
	}

	#[test]
	fn test_figer_deux_fois() {
		let mut d = devis();
		d.figer(1).unwrap();
		assert!(d.version_figee);
		assert!(d.figer(1).is_err());
	}

	#[test]
	fn test_suppression_hors_brouillon() {
		let mut d = devis();
		d.soumettre_validation().unwrap();
		let err = d.supprimer(1).unwrap_err();
		assert_eq!(err.kind(), "devis_not_modifiable");
	}

	#[test]
	fn test_suppression_version_figee() {
		let mut d = devis();
		d.figer(1).unwrap();
		let err = d.supprimer(1).unwrap_err();
		assert_eq!(err.kind(), "devis_validation");
	}

	#[test]
	fn test_revocation_acceptation() {
		let mut d = devis();
		d.soumettre_validation().unwrap();
		d.envoyer().unwrap();
		d.accepter().unwrap();
		d.revoquer_acceptation().unwrap();
		assert_eq!(d.statut, StatutDevis::EnNegociation);
		// Only an accepted quote can be rolled back
		assert!(d.revoquer_acceptation().is_err());
	}

	#[test]
	fn test_conversion() {
		let mut d = devis();
		d.soumettre_validation().unwrap();
		d.envoyer().unwrap();
		d.accepter().unwrap();
		d.convertir("CH-2026-007").unwrap();
		assert_eq!(d.statut, StatutDevis::Converti);
		assert_eq!(d.chantier_ref.as_deref(), Some("CH-2026-007"));
	}

	#[test]
	fn test_expiration() {
		let mut d = devis();
		d.date_validite = Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
		assert!(!d.est_expire(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
		assert!(d.est_expire(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
	}
}
