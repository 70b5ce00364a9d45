//! DPGF import use case.
//!
//! Decodes the file, parses each row with locale tolerance, groups rows
//! by lot code (default `DIVERS`), creates lots after the highest
//! existing order and lines carrying the quote's default VAT. Row
//! errors are collected with their 1-based line number; the import
//! fails when no valid row remains. Existing lots and lines are never
//! touched.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DevisRepository, JournalDevisRepository, LigneDevisRepository, LotDevisRepository,
};
use btp_types::{
	DevisError, JournalDevis, LigneDevis, LotDevis, TauxTVA, UniteArticle,
};

use crate::{DpgfColumnMapping, DpgfDecoder, ImportError};

/// Outcome of an import.
#[derive(Debug, Clone, Default)]
pub struct ImportDpgfResult {
	pub devis_id: i64,
	pub lots_crees: u32,
	pub lignes_creees: u32,
	pub lignes_ignorees: u32,
	/// (1-based line number, message) per rejected row.
	pub erreurs: Vec<(usize, String)>,
}

/// One parsed DPGF row.
struct LigneDpgf {
	lot: String,
	description: String,
	unite: UniteArticle,
	quantite: Decimal,
	prix_unitaire: Decimal,
}

/// Normalizes a raw unit label against the closed table, falling back
/// to `U`.
fn parser_unite(brut: &str) -> UniteArticle {
	match brut.trim().to_lowercase().as_str() {
		"u" | "unite" => UniteArticle::U,
		"ens" | "ensemble" => UniteArticle::Ens,
		"m" | "ml" => UniteArticle::Ml,
		"m2" | "m\u{b2}" => UniteArticle::M2,
		"m3" | "m\u{b3}" => UniteArticle::M3,
		"kg" => UniteArticle::Kg,
		"t" | "tonne" => UniteArticle::T,
		"h" | "heure" | "heures" => UniteArticle::Heure,
		"j" | "jour" | "jours" => UniteArticle::Jour,
		"ft" | "fft" | "forfait" => UniteArticle::Forfait,
		"l" | "litre" => UniteArticle::L,
		_ => UniteArticle::U,
	}
}

/// Parses a decimal with French tolerance: comma as decimal separator,
/// regular and non-breaking spaces ignored, `-` or empty as zero.
/// Negative or unparseable values collapse to zero with a warning.
fn parser_decimal(brut: &str, champ: &str, ligne_num: usize) -> (Decimal, Option<String>) {
	let nettoye: String = brut
		.trim()
		.replace(',', ".")
		.chars()
		.filter(|c| *c != ' ' && *c != '\u{a0}')
		.collect();
	if nettoye.is_empty() || nettoye == "-" {
		return (Decimal::ZERO, None);
	}
	match nettoye.parse::<Decimal>() {
		Ok(valeur) if valeur < Decimal::ZERO => (
			Decimal::ZERO,
			Some(format!(
				"Ligne {}: {} negatif ({}), mis a 0",
				ligne_num, champ, nettoye
			)),
		),
		Ok(valeur) => (valeur, None),
		Err(_) => (
			Decimal::ZERO,
			Some(format!(
				"Ligne {}: {} invalide ({:?}), mis a 0",
				ligne_num, champ, brut
			)),
		),
	}
}

/// Imports a DPGF file into a quote.
pub struct ImportDpgfUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub decoders: Vec<Arc<dyn DpgfDecoder>>,
}

impl ImportDpgfUseCase {
	#[instrument(skip_all, fields(devis_id, filename))]
	pub async fn execute(
		&self,
		devis_id: i64,
		contenu: &[u8],
		filename: &str,
		mapping: &DpgfColumnMapping,
		importe_par: i64,
	) -> Result<ImportDpgfResult, ImportError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		devis.verifier_modifiable()?;

		let decoder = self
			.decoders
			.iter()
			.find(|d| d.accepte(filename))
			.ok_or_else(|| {
				ImportError::Format(format!(
					"Format de fichier non supporte: {}. Formats acceptes: .csv",
					filename
				))
			})?;
		let lignes_brutes = decoder.decode(contenu, mapping).await?;
		if lignes_brutes.is_empty() {
			return Err(ImportError::Format(
				"Aucune ligne de donnees trouvee dans le fichier".into(),
			));
		}

		let mut lignes_valides: Vec<LigneDpgf> = Vec::new();
		let mut erreurs: Vec<(usize, String)> = Vec::new();
		for (index, cellules) in lignes_brutes.iter().enumerate() {
			let ligne_num = index + mapping.ligne_debut + 1;
			match Self::parser_ligne(cellules, mapping, ligne_num) {
				Ok(Some(ligne)) => lignes_valides.push(ligne),
				Ok(None) => {}
				Err(message) => erreurs.push((ligne_num, message)),
			}
		}
		if lignes_valides.is_empty() {
			return Err(ImportError::Format(format!(
				"Aucune ligne valide trouvee. {} erreurs de parsing.",
				erreurs.len()
			)));
		}

		// Group by lot code, preserving first-seen order
		let mut groupes: Vec<(String, Vec<LigneDpgf>)> = Vec::new();
		for ligne in lignes_valides {
			match groupes.iter_mut().find(|(code, _)| *code == ligne.lot) {
				Some((_, lignes)) => lignes.push(ligne),
				None => groupes.push((ligne.lot.clone(), vec![ligne])),
			}
		}

		// New lots land after the existing ones
		let lots_existants = self.lot_repo.find_by_devis(devis_id).await?;
		let mut ordre_lot = lots_existants.iter().map(|l| l.ordre).max().unwrap_or(0) + 1;

		let taux_tva = TauxTVA::new(devis.taux_tva_defaut)?;
		let mut resultat = ImportDpgfResult {
			devis_id,
			..Default::default()
		};
		for (code_lot, lignes_lot) in groupes {
			let mut lot =
				LotDevis::new(devis_id, code_lot.clone(), format!("Lot {}", code_lot), ordre_lot)?;
			lot.created_by = Some(importe_par);
			let lot = self.lot_repo.save(lot).await?;
			resultat.lots_crees += 1;
			ordre_lot += 1;

			for (index, ligne_dpgf) in lignes_lot.into_iter().enumerate() {
				let mut ligne = LigneDevis::new(
					lot.id.unwrap(),
					ligne_dpgf.description,
					ligne_dpgf.unite,
					ligne_dpgf.quantite,
					ligne_dpgf.prix_unitaire,
					taux_tva,
				)?;
				ligne.ordre = index as i32 + 1;
				ligne.created_by = Some(importe_par);
				self.ligne_repo.save(ligne).await?;
				resultat.lignes_creees += 1;
			}
		}

		resultat.lignes_ignorees = erreurs.len() as u32;
		resultat.erreurs = erreurs;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"import_dpgf",
				Some(importe_par),
				Some(json!({
					"fichier": filename,
					"lots_crees": resultat.lots_crees,
					"lignes_creees": resultat.lignes_creees,
					"lignes_ignorees": resultat.lignes_ignorees,
				})),
			)?)
			.await?;

		Ok(resultat)
	}

	/// Parses one row; `Ok(None)` for rows without a description.
	fn parser_ligne(
		cellules: &[String],
		mapping: &DpgfColumnMapping,
		ligne_num: usize,
	) -> Result<Option<LigneDpgf>, String> {
		let colonne = |index: usize| -> &str {
			cellules.get(index).map(|c| c.trim()).unwrap_or("")
		};

		let description = colonne(mapping.col_description);
		if description.is_empty() {
			return Ok(None);
		}
		let lot = {
			let brut = colonne(mapping.col_lot);
			if brut.is_empty() {
				"DIVERS".to_string()
			} else {
				brut.to_string()
			}
		};
		let unite = parser_unite(colonne(mapping.col_unite));

		// Parse warnings are non-blocking: faulty values collapse to 0
		let (quantite, _avertissement_quantite) =
			parser_decimal(colonne(mapping.col_quantite), "quantite", ligne_num);
		let (prix_unitaire, _avertissement_prix) =
			parser_decimal(colonne(mapping.col_prix_unitaire), "prix_unitaire", ligne_num);

		Ok(Some(LigneDpgf {
			lot,
			description: description.to_string(),
			unite,
			quantite,
			prix_unitaire,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use btp_storage::MemoryStores;
	use btp_types::Devis;

	use crate::CsvDpgfDecoder;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	async fn fixture() -> (Arc<MemoryStores>, i64, ImportDpgfUseCase) {
		let s = Arc::new(MemoryStores::new());
		let devis = s
			.devis
			.save(Devis::new("DEV-2026-001", "Client").unwrap())
			.await
			.unwrap();
		let uc = ImportDpgfUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			journal_repo: s.journal.clone(),
			decoders: vec![Arc::new(CsvDpgfDecoder::new())],
		};
		let devis_id = devis.id.unwrap();
		(s, devis_id, uc)
	}

	#[tokio::test]
	async fn test_import_nominal() {
		let (s, devis_id, uc) = fixture().await;
		let contenu = "Lot;Description;Unite;Quantite;PU\n\
			01;Terrassement general;m3;120;45,50\n\
			01;Evacuation des terres;m3;120;12\n\
			02;Beton de fondation;m3;35;1 250,00\n";
		let resultat = uc
			.execute(
				devis_id,
				contenu.as_bytes(),
				"bordereau.csv",
				&DpgfColumnMapping::default(),
				1,
			)
			.await
			.unwrap();

		assert_eq!(resultat.lots_crees, 2);
		assert_eq!(resultat.lignes_creees, 3);
		assert_eq!(resultat.lignes_ignorees, 0);

		let lots = s.lots.find_by_devis(devis_id).await.unwrap();
		assert_eq!(lots[0].code_lot, "01");
		let lignes = s.lignes.find_by_lot(lots[0].id.unwrap()).await.unwrap();
		assert_eq!(lignes[0].quantite, dec("120"));
		// French decimals: comma and grouping space tolerated
		assert_eq!(lignes[0].prix_unitaire_ht, dec("45.50"));
		let lignes_lot2 = s.lignes.find_by_lot(lots[1].id.unwrap()).await.unwrap();
		assert_eq!(lignes_lot2[0].prix_unitaire_ht, dec("1250.00"));

		let journal = s.journal.find_by_devis(devis_id).await.unwrap();
		assert_eq!(journal.last().unwrap().action, "import_dpgf");
	}

	#[tokio::test]
	async fn test_lot_par_defaut_et_unite_inconnue() {
		let (s, devis_id, uc) = fixture().await;
		let contenu = "Lot;Description;Unite;Quantite;PU\n;Nettoyage;sac;1;100\n";
		let resultat = uc
			.execute(
				devis_id,
				contenu.as_bytes(),
				"bordereau.csv",
				&DpgfColumnMapping::default(),
				1,
			)
			.await
			.unwrap();
		assert_eq!(resultat.lots_crees, 1);

		let lots = s.lots.find_by_devis(devis_id).await.unwrap();
		assert_eq!(lots[0].code_lot, "DIVERS");
		let lignes = s.lignes.find_by_lot(lots[0].id.unwrap()).await.unwrap();
		assert_eq!(lignes[0].unite, UniteArticle::U);
	}

	#[tokio::test]
	async fn test_import_apres_lots_existants() {
		let (s, devis_id, uc) = fixture().await;
		let mut existant = LotDevis::new(devis_id, "1", "Existant", 3).unwrap();
		existant.created_by = Some(1);
		s.lots.save(existant).await.unwrap();

		let contenu = "Lot;Description;Unite;Quantite;PU\nA;Ligne;u;1;10\n";
		uc.execute(
			devis_id,
			contenu.as_bytes(),
			"bordereau.csv",
			&DpgfColumnMapping::default(),
			1,
		)
		.await
		.unwrap();

		let lots = s.lots.find_by_devis(devis_id).await.unwrap();
		let nouveau = lots.iter().find(|l| l.code_lot == "A").unwrap();
		assert_eq!(nouveau.ordre, 4);
	}

	#[tokio::test]
	async fn test_format_inconnu() {
		let (_, devis_id, uc) = fixture().await;
		let err = uc
			.execute(
				devis_id,
				b"data",
				"bordereau.pdf",
				&DpgfColumnMapping::default(),
				1,
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "dpgf_format");
	}

	#[tokio::test]
	async fn test_aucune_ligne_valide() {
		let (_, devis_id, uc) = fixture().await;
		// Rows without a description are skipped; nothing remains
		let contenu = "Lot;Description;Unite;Quantite;PU\n1;;u;1;10\n";
		let err = uc
			.execute(
				devis_id,
				contenu.as_bytes(),
				"bordereau.csv",
				&DpgfColumnMapping::default(),
				1,
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "dpgf_format");
	}

	#[tokio::test]
	async fn test_devis_non_modifiable() {
		let (s, devis_id, uc) = fixture().await;
		let mut devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		devis.soumettre_validation().unwrap();
		s.devis.save(devis).await.unwrap();

		let contenu = "Lot;Description;Unite;Quantite;PU\n1;Ligne;u;1;10\n";
		let err = uc
			.execute(
				devis_id,
				contenu.as_bytes(),
				"bordereau.csv",
				&DpgfColumnMapping::default(),
				1,
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "devis_not_modifiable");
	}
}
