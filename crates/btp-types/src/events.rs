//! Domain events published after commit.
//!
//! Events are plain immutable records; the publisher port decides the
//! transport. Consumers (chantier and budget modules) react to the
//! conversion event to create their own entities without cross-module
//! imports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lot projection carried by [`DevisConvertEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConversionData {
	pub code_lot: String,
	pub libelle: String,
	pub montant_debourse_ht: Decimal,
	pub montant_vente_ht: Decimal,
}

/// Published when an accepted quote is converted into a work-site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevisConvertEvent {
	pub devis_id: i64,
	pub numero: String,
	pub client_nom: String,
	pub client_adresse: Option<String>,
	pub client_email: Option<String>,
	pub objet: Option<String>,
	pub montant_total_ht: Decimal,
	pub montant_total_ttc: Decimal,
	pub retenue_garantie_pct: Decimal,
	pub lots: Vec<LotConversionData>,
	pub commercial_id: Option<i64>,
	pub conducteur_id: Option<i64>,
	pub date_conversion: DateTime<Utc>,
}
