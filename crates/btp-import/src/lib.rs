//! DPGF importer for the BTP back-office core.
//!
//! A DPGF spreadsheet carries itemized construction lines (lot code,
//! description, unit, quantity, unit price). This crate defines the
//! decoder trait turning raw bytes into string rows, a CSV decoder
//! tolerant to legacy encodings and delimiters, and the use case that
//! creates the lots and lines inside a target quote.

use async_trait::async_trait;
use thiserror::Error;

use btp_types::DevisError;

/// Re-export implementations
pub mod implementations {
	pub mod csv;
}
/// Import use case.
pub mod importer;

pub use implementations::csv::CsvDpgfDecoder;
pub use importer::{ImportDpgfResult, ImportDpgfUseCase};

/// Errors that can occur during a DPGF import.
#[derive(Debug, Error)]
pub enum ImportError {
	/// The file format is not recognized or carries no data row.
	#[error("Format DPGF invalide: {0}")]
	Format(String),
	/// The import failed after decoding.
	#[error("Import DPGF en echec: {0}")]
	Import(String),
	/// Error from the quotation engine.
	#[error(transparent)]
	Devis(#[from] DevisError),
}

impl ImportError {
	/// Stable kind tag of this error.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Format(_) => "dpgf_format",
			Self::Import(_) => "dpgf_import",
			Self::Devis(err) => err.kind(),
		}
	}
}

impl From<btp_storage::StorageError> for ImportError {
	fn from(err: btp_storage::StorageError) -> Self {
		Self::Devis(err.into())
	}
}

/// Column mapping of a DPGF file, all indices 0-based.
#[derive(Debug, Clone)]
pub struct DpgfColumnMapping {
	pub col_lot: usize,
	pub col_description: usize,
	pub col_unite: usize,
	pub col_quantite: usize,
	pub col_prix_unitaire: usize,
	/// First data row (rows above are headers).
	pub ligne_debut: usize,
}

impl Default for DpgfColumnMapping {
	fn default() -> Self {
		Self {
			col_lot: 0,
			col_description: 1,
			col_unite: 2,
			col_quantite: 3,
			col_prix_unitaire: 4,
			ligne_debut: 1,
		}
	}
}

/// Decodes DPGF bytes into raw string rows.
///
/// Implementations handle format detection, encoding guesses and
/// delimiter sniffing; blank rows are dropped.
#[async_trait]
pub trait DpgfDecoder: Send + Sync {
	/// True when this decoder recognizes the file name.
	fn accepte(&self, filename: &str) -> bool;

	async fn decode(
		&self,
		contenu: &[u8],
		mapping: &DpgfColumnMapping,
	) -> Result<Vec<Vec<String>>, ImportError>;
}
