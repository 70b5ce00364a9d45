//! CSV decoder for DPGF files.
//!
//! Tolerates the encodings seen in the field (UTF-8, UTF-8 with BOM,
//! Latin-1, CP1252) and sniffs the delimiter among comma, semicolon and
//! tab on the first kilobytes of the file.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::{DpgfColumnMapping, DpgfDecoder, ImportError};

/// CSV implementation of the DPGF decoder.
#[derive(Default)]
pub struct CsvDpgfDecoder;

impl CsvDpgfDecoder {
	pub fn new() -> Self {
		Self
	}

	/// Decodes bytes, trying UTF-8 (with or without BOM) before the
	/// legacy single-byte encodings.
	fn decoder_texte(contenu: &[u8]) -> Result<String, ImportError> {
		// A BOM wins outright
		if let Some((encoding, longueur_bom)) = Encoding::for_bom(contenu) {
			let (texte, _, _) = encoding.decode(&contenu[longueur_bom..]);
			return Ok(texte.into_owned());
		}
		let (texte, _, mal_forme) = UTF_8.decode(contenu);
		if !mal_forme {
			return Ok(texte.into_owned());
		}
		// Latin-1 and CP1252 never fail on single bytes; CP1252 covers
		// the printable Latin-1 range plus the Windows punctuation
		let (texte, _, _) = WINDOWS_1252.decode(contenu);
		Ok(texte.into_owned())
	}

	/// Picks the delimiter with the most occurrences in the first 2 KiB.
	fn detecter_delimiteur(texte: &str) -> u8 {
		let echantillon: String = texte.chars().take(2048).collect();
		[b';', b',', b'\t']
			.into_iter()
			.max_by_key(|d| echantillon.matches(*d as char).count())
			.unwrap_or(b';')
	}
}

#[async_trait]
impl DpgfDecoder for CsvDpgfDecoder {
	fn accepte(&self, filename: &str) -> bool {
		filename.to_lowercase().ends_with(".csv")
	}

	async fn decode(
		&self,
		contenu: &[u8],
		mapping: &DpgfColumnMapping,
	) -> Result<Vec<Vec<String>>, ImportError> {
		let texte = Self::decoder_texte(contenu)?;
		let delimiteur = Self::detecter_delimiteur(&texte);

		let mut reader = csv::ReaderBuilder::new()
			.delimiter(delimiteur)
			.has_headers(false)
			.flexible(true)
			.from_reader(texte.as_bytes());

		let mut lignes = Vec::new();
		for (index, enregistrement) in reader.records().enumerate() {
			let enregistrement =
				enregistrement.map_err(|e| ImportError::Format(e.to_string()))?;
			if index < mapping.ligne_debut {
				continue;
			}
			let cellules: Vec<String> =
				enregistrement.iter().map(|c| c.to_string()).collect();
			// Blank rows are skipped
			if cellules.iter().any(|c| !c.trim().is_empty()) {
				lignes.push(cellules);
			}
		}
		Ok(lignes)
	}
}
