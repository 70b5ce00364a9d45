//! Storage module for the BTP back-office core.
//!
//! This crate defines one repository trait per aggregate root, all
//! soft-delete aware: `find_*` never returns deleted rows and `delete`
//! performs a soft delete where the entity supports it. `save` handles
//! both create (assigns an id) and update (preserves the id and
//! refreshes `updated_at`). In-memory implementations back the tests and
//! the default wiring; a relational backend can be swapped in behind the
//! same traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use btp_types::{
	Article, AttestationTva, ComparatifDevis, DebourseDetail, Devis, DevisError,
	FraisChantierDevis, JournalDevis, LigneDevis, LotDevis, RelanceDevis, SignatureDevis,
	StatutDevis,
};

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

pub use implementations::memory::MemoryStores;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// The requested row does not exist (or is soft-deleted).
	#[error("Not found")]
	NotFound,
	/// A uniqueness or concurrency constraint was violated.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// Error raised by the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

impl From<StorageError> for DevisError {
	fn from(err: StorageError) -> Self {
		DevisError::Stockage(err.to_string())
	}
}

/// Search filter set for quote lookups.
#[derive(Debug, Clone, Default)]
pub struct RechercheDevis {
	pub client_nom: Option<String>,
	pub statuts: Option<Vec<StatutDevis>>,
	pub date_debut: Option<NaiveDate>,
	pub date_fin: Option<NaiveDate>,
	pub montant_min: Option<Decimal>,
	pub montant_max: Option<Decimal>,
	pub commercial_id: Option<i64>,
	pub conducteur_id: Option<i64>,
	/// Free-text search over numero, client name and object.
	pub texte: Option<String>,
}

/// Repository of the quote aggregate root.
#[async_trait]
pub trait DevisRepository: Send + Sync {
	/// Creates or updates a quote. Creation assigns the id; update
	/// refreshes `updated_at`.
	async fn save(&self, devis: Devis) -> Result<Devis, StorageError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<Devis>, StorageError>;

	async fn find_by_numero(&self, numero: &str) -> Result<Option<Devis>, StorageError>;

	/// Lists quotes ordered by creation, most recent first.
	async fn find_all(&self, limit: usize, offset: usize) -> Result<Vec<Devis>, StorageError>;

	/// Applies the full search filter set.
	async fn search(&self, filtres: &RechercheDevis) -> Result<Vec<Devis>, StorageError>;

	/// Quotes created inside a date range (inclusive).
	async fn find_all_in_range(
		&self,
		debut: NaiveDate,
		fin: NaiveDate,
	) -> Result<Vec<Devis>, StorageError>;

	/// Returns the whole version family of a quote (original first,
	/// then versions ordered by version number).
	async fn find_versions(&self, devis_id: i64) -> Result<Vec<Devis>, StorageError>;

	/// Next version number inside the family rooted at `parent_id`.
	async fn get_next_version_number(&self, parent_id: i64) -> Result<i32, StorageError>;

	/// Generates the next `DEV-YYYY-NNN` number for a year.
	async fn generate_numero(&self, annee: i32) -> Result<String, StorageError>;

	async fn count(&self) -> Result<usize, StorageError>;

	async fn count_by_statut(&self) -> Result<HashMap<StatutDevis, u32>, StorageError>;

	async fn somme_montant_by_statut(
		&self,
	) -> Result<HashMap<StatutDevis, Decimal>, StorageError>;

	/// Quotes past their validity date and still in Envoye or Vu.
	async fn find_expires(&self, aujourd_hui: NaiveDate) -> Result<Vec<Devis>, StorageError>;
}

/// Repository of quote lots.
#[async_trait]
pub trait LotDevisRepository: Send + Sync {
	async fn save(&self, lot: LotDevis) -> Result<LotDevis, StorageError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<LotDevis>, StorageError>;

	/// Non-deleted lots of a quote, ordered by `ordre`.
	async fn find_by_devis(&self, devis_id: i64) -> Result<Vec<LotDevis>, StorageError>;

	async fn count_by_devis(&self, devis_id: i64) -> Result<usize, StorageError>;

	/// Soft delete.
	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError>;
}

/// Repository of quote lines.
#[async_trait]
pub trait LigneDevisRepository: Send + Sync {
	async fn save(&self, ligne: LigneDevis) -> Result<LigneDevis, StorageError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<LigneDevis>, StorageError>;

	/// Non-deleted lines of a lot, ordered by `ordre`.
	async fn find_by_lot(&self, lot_devis_id: i64) -> Result<Vec<LigneDevis>, StorageError>;

	/// Soft delete.
	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError>;
}

/// Repository of line discharge details.
#[async_trait]
pub trait DebourseDetailRepository: Send + Sync {
	async fn save(&self, detail: DebourseDetail) -> Result<DebourseDetail, StorageError>;

	async fn find_by_ligne(&self, ligne_devis_id: i64)
		-> Result<Vec<DebourseDetail>, StorageError>;

	/// Replaces all discharge details of a line wholesale.
	async fn replace_for_ligne(
		&self,
		ligne_devis_id: i64,
		details: Vec<DebourseDetail>,
	) -> Result<Vec<DebourseDetail>, StorageError>;

	async fn delete_by_ligne(&self, ligne_devis_id: i64) -> Result<(), StorageError>;
}

/// Repository of price-library articles.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
	async fn save(&self, article: Article) -> Result<Article, StorageError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<Article>, StorageError>;

	async fn find_by_code(&self, code: &str) -> Result<Option<Article>, StorageError>;

	/// Lists articles, optionally restricted to active ones.
	async fn find_all(&self, actifs_seulement: bool) -> Result<Vec<Article>, StorageError>;

	async fn count(&self) -> Result<usize, StorageError>;

	/// Soft delete.
	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError>;
}

/// Append-only repository of journal entries.
#[async_trait]
pub trait JournalDevisRepository: Send + Sync {
	/// Appends an entry. Entries are never mutated nor deleted.
	async fn save(&self, entree: JournalDevis) -> Result<JournalDevis, StorageError>;

	/// Entries of a quote in insertion order.
	async fn find_by_devis(&self, devis_id: i64) -> Result<Vec<JournalDevis>, StorageError>;
}

/// Repository of VAT attestations (1:1 with a quote).
#[async_trait]
pub trait AttestationTvaRepository: Send + Sync {
	async fn save(&self, attestation: AttestationTva) -> Result<AttestationTva, StorageError>;

	async fn find_by_devis(&self, devis_id: i64)
		-> Result<Option<AttestationTva>, StorageError>;
}

/// Repository of electronic signatures (1:1 with a quote).
#[async_trait]
pub trait SignatureDevisRepository: Send + Sync {
	async fn save(&self, signature: SignatureDevis) -> Result<SignatureDevis, StorageError>;

	async fn find_by_devis(&self, devis_id: i64)
		-> Result<Option<SignatureDevis>, StorageError>;
}

/// Repository of quote follow-ups.
#[async_trait]
pub trait RelanceDevisRepository: Send + Sync {
	async fn save(&self, relance: RelanceDevis) -> Result<RelanceDevis, StorageError>;

	async fn save_batch(
		&self,
		relances: Vec<RelanceDevis>,
	) -> Result<Vec<RelanceDevis>, StorageError>;

	async fn find_by_devis(&self, devis_id: i64) -> Result<Vec<RelanceDevis>, StorageError>;

	/// Planned relances of a quote.
	async fn find_planifiees_by_devis(
		&self,
		devis_id: i64,
	) -> Result<Vec<RelanceDevis>, StorageError>;

	/// Planned relances due at or before the given instant, across all
	/// quotes. Used by the execution batch.
	async fn find_planifiees_avant(
		&self,
		date: DateTime<Utc>,
	) -> Result<Vec<RelanceDevis>, StorageError>;
}

/// Repository of site expenses.
#[async_trait]
pub trait FraisChantierRepository: Send + Sync {
	async fn save(&self, frais: FraisChantierDevis)
		-> Result<FraisChantierDevis, StorageError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<FraisChantierDevis>, StorageError>;

	/// Non-deleted expenses of a quote, ordered by `ordre`.
	async fn find_by_devis(
		&self,
		devis_id: i64,
	) -> Result<Vec<FraisChantierDevis>, StorageError>;

	/// Soft delete.
	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError>;
}

/// Repository of version comparisons.
///
/// Saving is idempotent per (source, target) pair: the latest generation
/// supersedes any earlier record.
#[async_trait]
pub trait ComparatifRepository: Send + Sync {
	async fn save(&self, comparatif: ComparatifDevis)
		-> Result<ComparatifDevis, StorageError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<ComparatifDevis>, StorageError>;

	async fn find_by_pair(
		&self,
		devis_source_id: i64,
		devis_cible_id: i64,
	) -> Result<Option<ComparatifDevis>, StorageError>;
}
