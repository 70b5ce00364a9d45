//! Quote lines and their discharge details.
//!
//! A line is the leaf item of a quote: a quantity, a unit price, a VAT
//! rate, and optionally a breakdown of direct costs (discharge details).
//! Lines whose quantity comes from a digital survey are locked and refuse
//! quantity changes until unlocked.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::article::UniteArticle;
use crate::error::DevisError;
use crate::montant::arrondir_montant;
use crate::tva::TauxTVA;

/// Direct-cost kinds making up a line's debourse sec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDebourse {
	Moe,
	Materiaux,
	Materiel,
	SousTraitance,
	Deplacement,
}

impl TypeDebourse {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Moe => "Main d'oeuvre",
			Self::Materiaux => "Materiaux",
			Self::Materiel => "Materiel",
			Self::SousTraitance => "Sous-traitance",
			Self::Deplacement => "Deplacement",
		}
	}

	/// Short code used in reports.
	pub fn code_court(&self) -> &'static str {
		match self {
			Self::Moe => "MO",
			Self::Materiaux => "MAT",
			Self::Materiel => "MTL",
			Self::SousTraitance => "ST",
			Self::Deplacement => "DEP",
		}
	}

	pub fn tous() -> [TypeDebourse; 5] {
		[
			Self::Moe,
			Self::Materiaux,
			Self::Materiel,
			Self::SousTraitance,
			Self::Deplacement,
		]
	}
}

/// Per-kind payload of a discharge detail.
///
/// Labor carries the craft and hourly rate used to build the cost
/// (hours x hourly rate per craft); the other kinds carry nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NatureDebourse {
	Moe {
		metier: Option<String>,
		taux_horaire: Option<Decimal>,
	},
	Materiaux,
	Materiel,
	SousTraitance,
	Deplacement,
}

impl NatureDebourse {
	/// The flat kind tag of this payload.
	pub fn type_debourse(&self) -> TypeDebourse {
		match self {
			Self::Moe { .. } => TypeDebourse::Moe,
			Self::Materiaux => TypeDebourse::Materiaux,
			Self::Materiel => TypeDebourse::Materiel,
			Self::SousTraitance => TypeDebourse::SousTraitance,
			Self::Deplacement => TypeDebourse::Deplacement,
		}
	}
}

/// A direct-cost component of a quote line.
///
/// The sum of a line's discharge details is its debourse sec, the basis
/// of the cost-of-revenue and selling-price buildup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebourseDetail {
	pub id: Option<i64>,
	pub ligne_devis_id: i64,
	pub nature: NatureDebourse,
	pub libelle: String,
	pub quantite: Decimal,
	pub prix_unitaire: Decimal,
	/// Cached quantite x prix_unitaire.
	pub total: Decimal,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
}

impl DebourseDetail {
	pub fn new(
		ligne_devis_id: i64,
		nature: NatureDebourse,
		libelle: impl Into<String>,
		quantite: Decimal,
		prix_unitaire: Decimal,
	) -> Result<Self, DevisError> {
		let libelle = libelle.into();
		if ligne_devis_id <= 0 {
			return Err(DevisError::Validation(
				"L'ID de la ligne de devis est obligatoire".into(),
			));
		}
		if libelle.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le libelle du debourse est obligatoire".into(),
			));
		}
		if quantite < Decimal::ZERO {
			return Err(DevisError::Validation(
				"La quantite ne peut pas etre negative".into(),
			));
		}
		if prix_unitaire < Decimal::ZERO {
			return Err(DevisError::Validation(
				"Le prix unitaire ne peut pas etre negatif".into(),
			));
		}
		if let NatureDebourse::Moe {
			taux_horaire: Some(taux),
			..
		} = &nature
		{
			if *taux < Decimal::ZERO {
				return Err(DevisError::Validation(
					"Le taux horaire ne peut pas etre negatif".into(),
				));
			}
		}
		let total = quantite * prix_unitaire;
		Ok(Self {
			id: None,
			ligne_devis_id,
			nature,
			libelle,
			quantite,
			prix_unitaire,
			total,
			created_at: None,
			updated_at: None,
		})
	}

	/// Computed quantite x prix_unitaire.
	pub fn montant_calcule(&self) -> Decimal {
		self.quantite * self.prix_unitaire
	}

	pub fn est_moe(&self) -> bool {
		matches!(self.nature, NatureDebourse::Moe { .. })
	}
}

/// A leaf line item of a quote lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LigneDevis {
	pub id: Option<i64>,
	pub lot_devis_id: i64,
	/// Optional reference into the price library.
	pub article_id: Option<i64>,
	pub libelle: String,
	pub unite: UniteArticle,
	pub quantite: Decimal,
	pub prix_unitaire_ht: Decimal,
	pub taux_tva: TauxTVA,
	/// Line-level margin, highest precedence in the margin hierarchy.
	pub taux_marge_ligne: Option<Decimal>,
	pub ordre: i32,
	/// Quantity locked (comes from a digital survey).
	pub verrouille: bool,
	// Cached amounts, refreshed by the totals recompute
	pub total_ht: Decimal,
	pub montant_ttc: Decimal,
	pub debourse_sec: Decimal,
	pub prix_revient: Decimal,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
	pub created_by: Option<i64>,
	pub deleted_at: Option<DateTime<Utc>>,
	pub deleted_by: Option<i64>,
}

impl LigneDevis {
	pub fn new(
		lot_devis_id: i64,
		libelle: impl Into<String>,
		unite: UniteArticle,
		quantite: Decimal,
		prix_unitaire_ht: Decimal,
		taux_tva: TauxTVA,
	) -> Result<Self, DevisError> {
		let libelle = libelle.into();
		if lot_devis_id <= 0 {
			return Err(DevisError::Validation(
				"L'ID du lot de devis est obligatoire".into(),
			));
		}
		if libelle.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le libelle de la ligne est obligatoire".into(),
			));
		}
		if quantite < Decimal::ZERO {
			return Err(DevisError::Validation(
				"La quantite ne peut pas etre negative".into(),
			));
		}
		if prix_unitaire_ht < Decimal::ZERO {
			return Err(DevisError::Validation(
				"Le prix unitaire HT ne peut pas etre negatif".into(),
			));
		}
		let total_ht = arrondir_montant(quantite * prix_unitaire_ht);
		Ok(Self {
			id: None,
			lot_devis_id,
			article_id: None,
			libelle,
			unite,
			quantite,
			prix_unitaire_ht,
			taux_tva,
			taux_marge_ligne: None,
			ordre: 0,
			verrouille: false,
			total_ht,
			montant_ttc: Decimal::ZERO,
			debourse_sec: Decimal::ZERO,
			prix_revient: Decimal::ZERO,
			created_at: None,
			updated_at: None,
			created_by: None,
			deleted_at: None,
			deleted_by: None,
		})
	}

	/// Computed quantite x prix unitaire.
	pub fn montant_ht(&self) -> Decimal {
		self.quantite * self.prix_unitaire_ht
	}

	pub fn est_supprime(&self) -> bool {
		self.deleted_at.is_some()
	}

	/// Locks the quantity (digital survey).
	pub fn verrouiller(&mut self) {
		self.verrouille = true;
		self.updated_at = Some(Utc::now());
	}

	pub fn deverrouiller(&mut self) {
		self.verrouille = false;
		self.updated_at = Some(Utc::now());
	}

	/// Changes the quantity; locked lines refuse the change.
	pub fn modifier_quantite(&mut self, nouvelle_quantite: Decimal) -> Result<(), DevisError> {
		if self.verrouille {
			return Err(DevisError::Validation(
				"La quantite de cette ligne est verrouillee (metre numerique). \
				 Deverrouillez-la avant de la modifier."
					.into(),
			));
		}
		if nouvelle_quantite < Decimal::ZERO {
			return Err(DevisError::Validation(
				"La quantite ne peut pas etre negative".into(),
			));
		}
		self.quantite = nouvelle_quantite;
		self.total_ht = arrondir_montant(self.montant_ht());
		self.updated_at = Some(Utc::now());
		Ok(())
	}

	pub fn supprimer(&mut self, deleted_by: i64) {
		self.deleted_at = Some(Utc::now());
		self.deleted_by = Some(deleted_by);
	}
}
