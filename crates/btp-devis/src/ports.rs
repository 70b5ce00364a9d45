//! Ports to external collaborators.
//!
//! The core never reaches into transport or rendering details: PDF
//! layout, work-site creation, event transport and notification delivery
//! all sit behind these traits.

use async_trait::async_trait;
use rust_decimal::Decimal;

use btp_types::{Devis, DevisConvertEvent, DevisError, RelanceDevis};

use crate::usecases::pdf::DevisDetail;

/// Renders a quote projection into an A4 PDF.
///
/// The projection already respects the quote's presentation options and
/// never carries debourse-level fields; the generator must not display
/// any.
#[async_trait]
pub trait PdfGenerator: Send + Sync {
	async fn generate(&self, devis: &DevisDetail) -> Result<Vec<u8>, DevisError>;
}

/// Input for the work-site creation port.
#[derive(Debug, Clone)]
pub struct ChantierCreationData {
	pub nom: String,
	pub adresse: String,
	pub description: String,
	pub conducteur_ids: Vec<i64>,
}

/// Budget seeded from the quote.
#[derive(Debug, Clone)]
pub struct BudgetCreationData {
	pub montant_initial_ht: Decimal,
	pub retenue_garantie_pct: Decimal,
	pub seuil_alerte_pct: Decimal,
	pub seuil_validation_achat: Decimal,
	pub devis_id: i64,
}

/// Budget lot seeded from a quote lot.
#[derive(Debug, Clone)]
pub struct LotBudgetaireCreationData {
	pub code_lot: String,
	pub libelle: String,
	pub unite: String,
	pub quantite_prevue: Decimal,
	/// Cost side; falls back to the sale price when debourse is absent.
	pub prix_unitaire_ht: Decimal,
	pub ordre: i32,
	pub prix_vente_ht: Decimal,
}

/// Identifiers returned by the work-site creation port.
#[derive(Debug, Clone)]
pub struct ConversionChantierResult {
	pub chantier_id: i64,
	pub code_chantier: String,
	pub budget_id: i64,
	pub nb_lots_transferes: u32,
}

/// Creates a work-site, its budget and budget lots from a quote.
#[async_trait]
pub trait ChantierCreationPort: Send + Sync {
	async fn create_chantier_from_devis(
		&self,
		chantier: ChantierCreationData,
		budget: BudgetCreationData,
		lots: Vec<LotBudgetaireCreationData>,
	) -> Result<ConversionChantierResult, DevisError>;
}

/// Publishes domain events after commit.
#[async_trait]
pub trait EventPublisher: Send + Sync {
	async fn publish(&self, event: DevisConvertEvent) -> Result<(), DevisError>;
}

/// Work context of a chantier, used to pre-fill the default VAT rate.
#[derive(Debug, Clone, Default)]
pub struct ContexteTvaChantier {
	pub type_travaux: Option<String>,
	pub batiment_plus_2ans: Option<bool>,
	pub usage_habitation: Option<bool>,
}

/// Resolves the VAT context of a chantier reference, when known.
#[async_trait]
pub trait ChantierTvaResolver: Send + Sync {
	async fn resoudre(&self, chantier_ref: &str) -> Option<ContexteTvaChantier>;
}

/// Best-effort notification transport for relances.
///
/// The batch use case interprets a successful return as "sent".
#[async_trait]
pub trait NotificationTransport: Send + Sync {
	async fn envoyer_relance(
		&self,
		relance: &RelanceDevis,
		devis: &Devis,
	) -> Result<(), DevisError>;
}
