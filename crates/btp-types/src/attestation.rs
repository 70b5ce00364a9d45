//! Regulatory VAT attestations.
//!
//! Applying a reduced VAT rate (5.5% or 10%) on renovation work for a
//! building older than two years requires a client attestation: CERFA
//! 1301-SD for 5.5%, CERFA 1300-SD for 10%.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DevisError;

pub const NATURES_IMMEUBLE_VALIDES: [&str; 3] = ["maison", "appartement", "immeuble"];
pub const NATURES_TRAVAUX_VALIDES: [&str; 3] = ["amelioration", "entretien", "transformation"];

/// A CERFA attestation covering a reduced VAT rate on a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationTva {
	pub id: Option<i64>,
	pub devis_id: i64,
	/// "1300-SD" or "1301-SD".
	pub type_cerfa: String,
	/// 5.5 or 10.
	pub taux_tva: Decimal,
	pub nom_client: String,
	pub adresse_client: String,
	pub telephone_client: Option<String>,
	pub adresse_immeuble: String,
	/// "maison", "appartement" or "immeuble".
	pub nature_immeuble: String,
	pub date_construction_plus_2ans: bool,
	pub description_travaux: String,
	/// "amelioration", "entretien" or "transformation".
	pub nature_travaux: String,
	pub atteste_par: String,
	pub date_attestation: Option<DateTime<Utc>>,
	pub generee_at: Option<DateTime<Utc>>,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
}

impl AttestationTva {
	pub fn new(
		devis_id: i64,
		type_cerfa: impl Into<String>,
		taux_tva: Decimal,
	) -> Result<Self, DevisError> {
		let type_cerfa = type_cerfa.into();
		if !["1300-SD", "1301-SD"].contains(&type_cerfa.as_str()) {
			return Err(DevisError::AttestationValidation(format!(
				"Type CERFA invalide: {}. Valeurs autorisees: 1300-SD, 1301-SD",
				type_cerfa
			)));
		}
		let cinq_et_demi = Decimal::new(55, 1);
		let dix = Decimal::from(10);
		if taux_tva != cinq_et_demi && taux_tva != dix {
			return Err(DevisError::AttestationValidation(format!(
				"Taux TVA invalide pour attestation: {}%. \
				 Seuls les taux reduits (5.5%, 10%) necessitent une attestation.",
				taux_tva
			)));
		}
		// CERFA / rate coherence
		if taux_tva == cinq_et_demi && type_cerfa != "1301-SD" {
			return Err(DevisError::AttestationValidation(
				"Le taux 5.5% (travaux lourds) necessite le CERFA 1301-SD".into(),
			));
		}
		if taux_tva == dix && type_cerfa != "1300-SD" {
			return Err(DevisError::AttestationValidation(
				"Le taux 10% (travaux simples) necessite le CERFA 1300-SD".into(),
			));
		}
		Ok(Self {
			id: None,
			devis_id,
			type_cerfa,
			taux_tva,
			nom_client: String::new(),
			adresse_client: String::new(),
			telephone_client: None,
			adresse_immeuble: String::new(),
			nature_immeuble: "maison".into(),
			date_construction_plus_2ans: true,
			description_travaux: String::new(),
			nature_travaux: "amelioration".into(),
			atteste_par: String::new(),
			date_attestation: None,
			generee_at: None,
			created_at: None,
			updated_at: None,
		})
	}

	/// Validates the enumerated building/work natures.
	pub fn valider_natures(&self) -> Result<(), DevisError> {
		if !NATURES_IMMEUBLE_VALIDES.contains(&self.nature_immeuble.as_str()) {
			return Err(DevisError::AttestationValidation(format!(
				"Nature d'immeuble invalide: {}",
				self.nature_immeuble
			)));
		}
		if !NATURES_TRAVAUX_VALIDES.contains(&self.nature_travaux.as_str()) {
			return Err(DevisError::AttestationValidation(format!(
				"Nature de travaux invalide: {}",
				self.nature_travaux
			)));
		}
		Ok(())
	}

	/// True when every mandatory field is filled and the building is
	/// older than two years.
	pub fn est_valide(&self) -> bool {
		let champs = [
			&self.nom_client,
			&self.adresse_client,
			&self.adresse_immeuble,
			&self.description_travaux,
			&self.atteste_par,
		];
		champs.iter().all(|c| !c.trim().is_empty()) && self.date_construction_plus_2ans
	}

	/// Signs the attestation; all mandatory fields must be present.
	pub fn signer(&mut self, signataire: impl Into<String>) -> Result<(), DevisError> {
		self.atteste_par = signataire.into();
		self.date_attestation = Some(Utc::now());
		self.updated_at = Some(Utc::now());
		if !self.est_valide() {
			return Err(DevisError::AttestationValidation(
				"L'attestation ne peut pas etre signee: \
				 tous les champs obligatoires doivent etre remplis."
					.into(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	#[test]
	fn test_coherence_cerfa_taux() {
		assert!(AttestationTva::new(1, "1301-SD", dec("5.5")).is_ok());
		assert!(AttestationTva::new(1, "1300-SD", dec("10")).is_ok());
		// Mismatched pairings are rejected
		assert!(AttestationTva::new(1, "1300-SD", dec("5.5")).is_err());
		assert!(AttestationTva::new(1, "1301-SD", dec("10")).is_err());
	}

	#[test]
	fn test_taux_standard_refuse() {
		let err = AttestationTva::new(1, "1300-SD", dec("20")).unwrap_err();
		assert_eq!(err.kind(), "attestation_tva_validation");
	}

	#[test]
	fn test_signature_champs_obligatoires() {
		let mut att = AttestationTva::new(1, "1301-SD", dec("5.5")).unwrap();
		assert!(att.signer("M. Martin").is_err());

		att.nom_client = "Client".into();
		att.adresse_client = "1 rue de la Paix".into();
		att.adresse_immeuble = "1 rue de la Paix".into();
		att.description_travaux = "Isolation des combles".into();
		att.signer("M. Martin").unwrap();
		assert!(att.est_valide());
		assert!(att.date_attestation.is_some());
	}

	#[test]
	fn test_immeuble_recent_invalide() {
		let mut att = AttestationTva::new(1, "1300-SD", dec("10")).unwrap();
		att.nom_client = "Client".into();
		att.adresse_client = "adresse".into();
		att.adresse_immeuble = "adresse".into();
		att.description_travaux = "travaux".into();
		att.atteste_par = "M. Martin".into();
		att.date_construction_plus_2ans = false;
		assert!(!att.est_valide());
	}
}
