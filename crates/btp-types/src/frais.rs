//! Site expenses attached to a quote.
//!
//! Frais de chantier (prorata account, overheads, site installations) add
//! to the quote's lots. They are either global or spread prorata of each
//! lot's HT amount.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DevisError;
use crate::montant::{arrondir_montant, calculer_ttc};

/// Kind of site expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFraisChantier {
	/// Shared inter-company charges.
	ComptePorata,
	/// Site overheads (supervision, insurance...).
	FraisGeneraux,
	/// Site installations (site hut, fences...).
	InstallationChantier,
	Autre,
}

impl TypeFraisChantier {
	pub fn label(&self) -> &'static str {
		match self {
			Self::ComptePorata => "Compte prorata",
			Self::FraisGeneraux => "Frais generaux",
			Self::InstallationChantier => "Installation de chantier",
			Self::Autre => "Autre",
		}
	}
}

/// Allocation mode of a site expense across lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeRepartition {
	/// Applies globally to the quote, not ventilated by lot.
	Global,
	/// Spread prorata of each lot's HT amount.
	ProrataLots,
}

impl ModeRepartition {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Global => "Global",
			Self::ProrataLots => "Prorata des lots",
		}
	}
}

/// A site expense carried by a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraisChantierDevis {
	pub id: Option<i64>,
	pub devis_id: i64,
	pub type_frais: TypeFraisChantier,
	pub libelle: String,
	pub montant_ht: Decimal,
	pub mode_repartition: ModeRepartition,
	pub taux_tva: Decimal,
	pub ordre: i32,
	/// Optional direct pinning to one lot.
	pub lot_devis_id: Option<i64>,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
	pub created_by: Option<i64>,
	pub deleted_at: Option<DateTime<Utc>>,
	pub deleted_by: Option<i64>,
}

impl FraisChantierDevis {
	pub fn new(
		devis_id: i64,
		type_frais: TypeFraisChantier,
		libelle: impl Into<String>,
		montant_ht: Decimal,
	) -> Result<Self, DevisError> {
		let libelle = libelle.into();
		if devis_id <= 0 {
			return Err(DevisError::FraisValidation(
				"L'ID du devis est obligatoire".into(),
			));
		}
		if libelle.trim().is_empty() {
			return Err(DevisError::FraisValidation(
				"Le libelle du frais de chantier est obligatoire".into(),
			));
		}
		if montant_ht < Decimal::ZERO {
			return Err(DevisError::FraisValidation(
				"Le montant HT ne peut pas etre negatif".into(),
			));
		}
		Ok(Self {
			id: None,
			devis_id,
			type_frais,
			libelle,
			montant_ht,
			mode_repartition: ModeRepartition::Global,
			taux_tva: Decimal::from(20),
			ordre: 0,
			lot_devis_id: None,
			created_at: None,
			updated_at: None,
			created_by: None,
			deleted_at: None,
			deleted_by: None,
		})
	}

	/// Re-checks invariants after field edits.
	pub fn valider(&self) -> Result<(), DevisError> {
		if self.montant_ht < Decimal::ZERO {
			return Err(DevisError::FraisValidation(
				"Le montant HT ne peut pas etre negatif".into(),
			));
		}
		if self.taux_tva < Decimal::ZERO || self.taux_tva > Decimal::ONE_HUNDRED {
			return Err(DevisError::FraisValidation(
				"Le taux de TVA doit etre entre 0 et 100%".into(),
			));
		}
		Ok(())
	}

	pub fn montant_ttc(&self) -> Decimal {
		calculer_ttc(self.montant_ht, self.taux_tva)
	}

	pub fn est_supprime(&self) -> bool {
		self.deleted_at.is_some()
	}

	/// Share of this expense attributed to one lot.
	///
	/// Global mode returns the full amount; prorata mode returns
	/// `montant_ht x lot_total_ht / devis_total_ht` (0 when the quote
	/// total is not positive).
	pub fn calculer_repartition_lot(
		&self,
		lot_total_ht: Decimal,
		devis_total_ht: Decimal,
	) -> Decimal {
		match self.mode_repartition {
			ModeRepartition::Global => self.montant_ht,
			ModeRepartition::ProrataLots => {
				if devis_total_ht <= Decimal::ZERO {
					return Decimal::ZERO;
				}
				arrondir_montant(self.montant_ht * lot_total_ht / devis_total_ht)
			}
		}
	}

	pub fn supprimer(&mut self, deleted_by: i64) {
		self.deleted_at = Some(Utc::now());
		self.deleted_by = Some(deleted_by);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	fn frais(montant: &str) -> FraisChantierDevis {
		FraisChantierDevis::new(
			1,
			TypeFraisChantier::ComptePorata,
			"Compte prorata",
			dec(montant),
		)
		.unwrap()
	}

	#[test]
	fn test_repartition_globale() {
		let f = frais("1000");
		assert_eq!(
			f.calculer_repartition_lot(dec("500"), dec("2000")),
			dec("1000")
		);
	}

	#[test]
	fn test_repartition_prorata() {
		let mut f = frais("1000");
		f.mode_repartition = ModeRepartition::ProrataLots;
		assert_eq!(
			f.calculer_repartition_lot(dec("500"), dec("2000")),
			dec("250.00")
		);
		// Quote total at zero yields zero
		assert_eq!(
			f.calculer_repartition_lot(dec("500"), Decimal::ZERO),
			Decimal::ZERO
		);
	}

	#[test]
	fn test_montant_ttc() {
		let f = frais("100");
		assert_eq!(f.montant_ttc(), dec("120.00"));
	}

	#[test]
	fn test_montant_negatif() {
		let err = FraisChantierDevis::new(
			1,
			TypeFraisChantier::Autre,
			"Divers",
			dec("-1"),
		)
		.unwrap_err();
		assert_eq!(err.kind(), "frais_chantier_validation");
	}
}
