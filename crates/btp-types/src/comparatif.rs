//! Pair comparison between two quote versions.
//!
//! A comparison captures aggregate deltas between a source and a target
//! quote, plus per-line diffs. It is persisted for later consultation
//! and regenerating the same pair replaces the previous record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DevisError;
use crate::version::TypeEcart;

/// One per-line difference between two quote versions.
///
/// Matching uses `article:<id>` when the line references an article, else
/// `lot:<lot_titre>|desig:<designation>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatifLigne {
	pub id: Option<i64>,
	pub comparatif_id: i64,
	pub type_ecart: TypeEcart,
	pub lot_titre: String,
	pub designation: String,
	pub article_id: Option<i64>,
	// Source side (old version)
	pub source_quantite: Option<Decimal>,
	pub source_prix_unitaire: Option<Decimal>,
	pub source_montant_ht: Option<Decimal>,
	pub source_debourse_sec: Option<Decimal>,
	// Target side (new version)
	pub cible_quantite: Option<Decimal>,
	pub cible_prix_unitaire: Option<Decimal>,
	pub cible_montant_ht: Option<Decimal>,
	pub cible_debourse_sec: Option<Decimal>,
	// Deltas
	pub ecart_quantite: Option<Decimal>,
	pub ecart_prix_unitaire: Option<Decimal>,
	pub ecart_montant_ht: Option<Decimal>,
	pub ecart_debourse_sec: Option<Decimal>,
}

impl ComparatifLigne {
	/// Percentage delta of the HT amount relative to the source, when
	/// computable.
	pub fn pourcentage_ecart_montant(&self) -> Option<Decimal> {
		match (self.source_montant_ht, self.ecart_montant_ht) {
			(Some(source), Some(ecart)) if source != Decimal::ZERO => {
				Some(ecart / source * Decimal::ONE_HUNDRED)
			}
			_ => None,
		}
	}
}

/// Aggregate comparison between two quote versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatifDevis {
	pub id: Option<i64>,
	pub devis_source_id: i64,
	pub devis_cible_id: i64,
	pub ecart_montant_ht: Decimal,
	pub ecart_montant_ttc: Decimal,
	pub ecart_marge_pct: Decimal,
	pub ecart_debourse_total: Decimal,
	pub nb_lignes_ajoutees: u32,
	pub nb_lignes_supprimees: u32,
	pub nb_lignes_modifiees: u32,
	pub nb_lignes_identiques: u32,
	pub lignes: Vec<ComparatifLigne>,
	pub genere_par: Option<i64>,
	pub created_at: Option<DateTime<Utc>>,
}

impl ComparatifDevis {
	pub fn new(devis_source_id: i64, devis_cible_id: i64) -> Result<Self, DevisError> {
		if devis_source_id <= 0 || devis_cible_id <= 0 {
			return Err(DevisError::Validation(
				"Les IDs des devis compares sont obligatoires".into(),
			));
		}
		if devis_source_id == devis_cible_id {
			return Err(DevisError::Validation(
				"Le devis source et le devis cible doivent etre differents".into(),
			));
		}
		Ok(Self {
			id: None,
			devis_source_id,
			devis_cible_id,
			ecart_montant_ht: Decimal::ZERO,
			ecart_montant_ttc: Decimal::ZERO,
			ecart_marge_pct: Decimal::ZERO,
			ecart_debourse_total: Decimal::ZERO,
			nb_lignes_ajoutees: 0,
			nb_lignes_supprimees: 0,
			nb_lignes_modifiees: 0,
			nb_lignes_identiques: 0,
			lignes: Vec::new(),
			genere_par: None,
			created_at: None,
		})
	}

	pub fn nb_lignes_total(&self) -> u32 {
		self.nb_lignes_ajoutees
			+ self.nb_lignes_supprimees
			+ self.nb_lignes_modifiees
			+ self.nb_lignes_identiques
	}

	pub fn a_des_ecarts(&self) -> bool {
		self.nb_lignes_ajoutees > 0
			|| self.nb_lignes_supprimees > 0
			|| self.nb_lignes_modifiees > 0
	}
}
