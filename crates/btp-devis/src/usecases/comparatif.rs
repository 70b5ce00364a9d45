//! Comparison use cases.
//!
//! Matching between two quote trees uses `article:<id>` when the line
//! references an article, else `lot:<lot_titre>|desig:<designation>`.
//! Source entries missing from the target are suppressions; matched
//! entries with all four deltas (quantity, unit price, HT total,
//! debourse sec) at zero are identical, otherwise modifications;
//! remaining target entries are additions. The persisted result
//! replaces any earlier comparison for the same pair.

use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	ComparatifRepository, DevisRepository, JournalDevisRepository, LigneDevisRepository,
	LotDevisRepository,
};
use btp_types::{
	ComparatifDevis, ComparatifLigne, DevisError, JournalDevis, LigneDevis, TypeEcart,
};

/// One collected line with its matching context.
struct LigneAvecLot {
	lot_titre: String,
	designation: String,
	article_id: Option<i64>,
	ligne: LigneDevis,
}

fn cle_matching(entree: &LigneAvecLot) -> String {
	match entree.article_id {
		Some(article_id) => format!("article:{}", article_id),
		None => format!("lot:{}|desig:{}", entree.lot_titre, entree.designation),
	}
}

/// Generates and persists the diff between two quote versions.
pub struct GenererComparatifUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub comparatif_repo: Arc<dyn ComparatifRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl GenererComparatifUseCase {
	#[instrument(skip_all, fields(devis_source_id, devis_cible_id))]
	pub async fn execute(
		&self,
		devis_source_id: i64,
		devis_cible_id: i64,
		genere_par: i64,
	) -> Result<ComparatifDevis, DevisError> {
		let mut comparatif = ComparatifDevis::new(devis_source_id, devis_cible_id)?;

		let source = self
			.devis_repo
			.find_by_id(devis_source_id)
			.await?
			.ok_or(DevisError::DevisNotFound {
				devis_id: devis_source_id,
			})?;
		let cible = self
			.devis_repo
			.find_by_id(devis_cible_id)
			.await?
			.ok_or(DevisError::DevisNotFound {
				devis_id: devis_cible_id,
			})?;

		let lignes_source = self.collecter(devis_source_id).await?;
		let lignes_cible = self.collecter(devis_cible_id).await?;

		let index_cible: HashMap<String, &LigneAvecLot> = lignes_cible
			.iter()
			.map(|entree| (cle_matching(entree), entree))
			.collect();
		let mut cles_matchees: Vec<String> = Vec::new();

		for entree_source in &lignes_source {
			let cle = cle_matching(entree_source);
			match index_cible.get(&cle) {
				None => {
					comparatif.lignes.push(Self::ligne_suppression(entree_source));
					comparatif.nb_lignes_supprimees += 1;
				}
				Some(entree_cible) => {
					cles_matchees.push(cle);
					let (ligne, identique) =
						Self::ligne_commune(entree_source, *entree_cible);
					comparatif.lignes.push(ligne);
					if identique {
						comparatif.nb_lignes_identiques += 1;
					} else {
						comparatif.nb_lignes_modifiees += 1;
					}
				}
			}
		}

		for entree_cible in &lignes_cible {
			let cle = cle_matching(entree_cible);
			if !cles_matchees.contains(&cle) {
				comparatif.lignes.push(Self::ligne_ajout(entree_cible));
				comparatif.nb_lignes_ajoutees += 1;
			}
		}

		comparatif.ecart_montant_ht = cible.montant_total_ht - source.montant_total_ht;
		comparatif.ecart_montant_ttc = cible.montant_total_ttc - source.montant_total_ttc;
		comparatif.ecart_marge_pct = cible.taux_marge_global - source.taux_marge_global;
		comparatif.ecart_debourse_total = comparatif
			.lignes
			.iter()
			.filter_map(|l| l.ecart_debourse_sec)
			.sum();
		comparatif.genere_par = Some(genere_par);

		let comparatif = self.comparatif_repo.save(comparatif).await?;

		for devis_id in [devis_source_id, devis_cible_id] {
			self.journal_repo
				.save(JournalDevis::new(
					devis_id,
					"comparatif_genere",
					Some(genere_par),
					Some(json!({
						"comparatif_id": comparatif.id,
						"devis_source": source.numero,
						"devis_cible": cible.numero,
					})),
				)?)
				.await?;
		}

		Ok(comparatif)
	}

	async fn collecter(&self, devis_id: i64) -> Result<Vec<LigneAvecLot>, DevisError> {
		let mut resultat = Vec::new();
		for lot in self.lot_repo.find_by_devis(devis_id).await? {
			for ligne in self.ligne_repo.find_by_lot(lot.id.unwrap_or_default()).await? {
				resultat.push(LigneAvecLot {
					lot_titre: lot.libelle.clone(),
					designation: ligne.libelle.clone(),
					article_id: ligne.article_id,
					ligne,
				});
			}
		}
		Ok(resultat)
	}

	fn ligne_suppression(entree: &LigneAvecLot) -> ComparatifLigne {
		let ligne = &entree.ligne;
		ComparatifLigne {
			id: None,
			comparatif_id: 0,
			type_ecart: TypeEcart::Suppression,
			lot_titre: entree.lot_titre.clone(),
			designation: entree.designation.clone(),
			article_id: entree.article_id,
			source_quantite: Some(ligne.quantite),
			source_prix_unitaire: Some(ligne.prix_unitaire_ht),
			source_montant_ht: Some(ligne.total_ht),
			source_debourse_sec: Some(ligne.debourse_sec),
			cible_quantite: None,
			cible_prix_unitaire: None,
			cible_montant_ht: None,
			cible_debourse_sec: None,
			ecart_quantite: Some(-ligne.quantite),
			ecart_prix_unitaire: Some(-ligne.prix_unitaire_ht),
			ecart_montant_ht: Some(-ligne.total_ht),
			ecart_debourse_sec: Some(-ligne.debourse_sec),
		}
	}

	fn ligne_ajout(entree: &LigneAvecLot) -> ComparatifLigne {
		let ligne = &entree.ligne;
		ComparatifLigne {
			id: None,
			comparatif_id: 0,
			type_ecart: TypeEcart::Ajout,
			lot_titre: entree.lot_titre.clone(),
			designation: entree.designation.clone(),
			article_id: entree.article_id,
			source_quantite: None,
			source_prix_unitaire: None,
			source_montant_ht: None,
			source_debourse_sec: None,
			cible_quantite: Some(ligne.quantite),
			cible_prix_unitaire: Some(ligne.prix_unitaire_ht),
			cible_montant_ht: Some(ligne.total_ht),
			cible_debourse_sec: Some(ligne.debourse_sec),
			ecart_quantite: Some(ligne.quantite),
			ecart_prix_unitaire: Some(ligne.prix_unitaire_ht),
			ecart_montant_ht: Some(ligne.total_ht),
			ecart_debourse_sec: Some(ligne.debourse_sec),
		}
	}

	fn ligne_commune(
		entree_source: &LigneAvecLot,
		entree_cible: &LigneAvecLot,
	) -> (ComparatifLigne, bool) {
		let src = &entree_source.ligne;
		let cbl = &entree_cible.ligne;
		let ecart_quantite = cbl.quantite - src.quantite;
		let ecart_prix = cbl.prix_unitaire_ht - src.prix_unitaire_ht;
		let ecart_ht = cbl.total_ht - src.total_ht;
		let ecart_debourse = cbl.debourse_sec - src.debourse_sec;
		let identique = ecart_quantite == Decimal::ZERO
			&& ecart_prix == Decimal::ZERO
			&& ecart_ht == Decimal::ZERO
			&& ecart_debourse == Decimal::ZERO;

		let ligne = ComparatifLigne {
			id: None,
			comparatif_id: 0,
			type_ecart: if identique {
				TypeEcart::Identique
			} else {
				TypeEcart::Modification
			},
			lot_titre: entree_source.lot_titre.clone(),
			designation: entree_source.designation.clone(),
			article_id: entree_source.article_id,
			source_quantite: Some(src.quantite),
			source_prix_unitaire: Some(src.prix_unitaire_ht),
			source_montant_ht: Some(src.total_ht),
			source_debourse_sec: Some(src.debourse_sec),
			cible_quantite: Some(cbl.quantite),
			cible_prix_unitaire: Some(cbl.prix_unitaire_ht),
			cible_montant_ht: Some(cbl.total_ht),
			cible_debourse_sec: Some(cbl.debourse_sec),
			ecart_quantite: Some(ecart_quantite),
			ecart_prix_unitaire: Some(ecart_prix),
			ecart_montant_ht: Some(ecart_ht),
			ecart_debourse_sec: Some(ecart_debourse),
		};
		(ligne, identique)
	}
}

/// Fetches a stored comparison.
pub struct GetComparatifUseCase {
	pub comparatif_repo: Arc<dyn ComparatifRepository>,
}

impl GetComparatifUseCase {
	pub async fn execute(&self, comparatif_id: i64) -> Result<ComparatifDevis, DevisError> {
		self.comparatif_repo
			.find_by_id(comparatif_id)
			.await?
			.ok_or(DevisError::ComparatifNotFound { comparatif_id })
	}
}
