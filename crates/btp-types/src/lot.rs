//! Quote lots.
//!
//! Lots form a tree via `parent_id`; traversals for numbering,
//! duplication and comparison expand the tree depth-first through the
//! repository rather than through object references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DevisError;

/// A section or chapter of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotDevis {
	pub id: Option<i64>,
	pub devis_id: i64,
	/// Hierarchical code: `1`, `1.2`, `2.1.3`.
	pub code_lot: String,
	pub libelle: String,
	pub ordre: i32,
	/// Lot-level margin, applies to lines without their own margin.
	pub taux_marge_lot: Option<Decimal>,
	pub parent_id: Option<i64>,
	// Cached amounts, refreshed by the totals recompute
	pub montant_debourse_ht: Decimal,
	pub montant_vente_ht: Decimal,
	pub montant_vente_ttc: Decimal,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
	pub created_by: Option<i64>,
	pub deleted_at: Option<DateTime<Utc>>,
	pub deleted_by: Option<i64>,
}

impl LotDevis {
	pub fn new(
		devis_id: i64,
		code_lot: impl Into<String>,
		libelle: impl Into<String>,
		ordre: i32,
	) -> Result<Self, DevisError> {
		let code_lot = code_lot.into();
		let libelle = libelle.into();
		if devis_id <= 0 {
			return Err(DevisError::Validation("L'ID du devis est obligatoire".into()));
		}
		if code_lot.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le code du lot est obligatoire".into(),
			));
		}
		if libelle.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le libelle du lot est obligatoire".into(),
			));
		}
		Ok(Self {
			id: None,
			devis_id,
			code_lot,
			libelle,
			ordre,
			taux_marge_lot: None,
			parent_id: None,
			montant_debourse_ht: Decimal::ZERO,
			montant_vente_ht: Decimal::ZERO,
			montant_vente_ttc: Decimal::ZERO,
			created_at: None,
			updated_at: None,
			created_by: None,
			deleted_at: None,
			deleted_by: None,
		})
	}

	/// True when this lot is a sub-chapter of another lot.
	pub fn est_sous_chapitre(&self) -> bool {
		self.parent_id.is_some()
	}

	pub fn est_supprime(&self) -> bool {
		self.deleted_at.is_some()
	}

	pub fn supprimer(&mut self, deleted_by: i64) {
		self.deleted_at = Some(Utc::now());
		self.deleted_by = Some(deleted_by);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_creation() {
		let lot = LotDevis::new(1, "1", "Gros oeuvre", 0).unwrap();
		assert!(!lot.est_sous_chapitre());
		assert!(!lot.est_supprime());
	}

	#[test]
	fn test_code_obligatoire() {
		assert!(LotDevis::new(1, "", "Gros oeuvre", 0).is_err());
		assert!(LotDevis::new(0, "1", "Gros oeuvre", 0).is_err());
	}
}
