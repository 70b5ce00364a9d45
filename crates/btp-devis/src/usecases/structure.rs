//! Quote structure use cases: lot and line CRUD, renumbering and the
//! tree projection.

use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	ArticleRepository, DebourseDetailRepository, DevisRepository, JournalDevisRepository,
	LigneDevisRepository, LotDevisRepository,
};
use btp_types::{
	DebourseDetail, Devis, DevisError, JournalDevis, LigneDevis, LotDevis, NatureDebourse,
	TauxTVA, UniteArticle,
};

use crate::services::numerotation::NumerotationService;

/// Input of [`CreateLotUseCase`].
#[derive(Debug, Clone, Default)]
pub struct LotInput {
	pub libelle: String,
	pub parent_id: Option<i64>,
	pub taux_marge_lot: Option<Decimal>,
}

/// Input of line creation/update.
#[derive(Debug, Clone, Default)]
pub struct LigneInput {
	pub libelle: Option<String>,
	pub unite: Option<UniteArticle>,
	pub quantite: Option<Decimal>,
	pub prix_unitaire_ht: Option<Decimal>,
	pub taux_tva: Option<TauxTVA>,
	pub taux_marge_ligne: Option<Decimal>,
	pub article_id: Option<i64>,
	/// When present, replaces the line's discharge details wholesale.
	pub debourses: Option<Vec<DebourseInput>>,
}

/// One discharge detail of a line input.
#[derive(Debug, Clone)]
pub struct DebourseInput {
	pub nature: NatureDebourse,
	pub libelle: String,
	pub quantite: Decimal,
	pub prix_unitaire: Decimal,
}

async fn devis_modifiable(
	devis_repo: &Arc<dyn DevisRepository>,
	devis_id: i64,
) -> Result<Devis, DevisError> {
	let devis = devis_repo
		.find_by_id(devis_id)
		.await?
		.ok_or(DevisError::DevisNotFound { devis_id })?;
	devis.verifier_modifiable()?;
	Ok(devis)
}

/// Creates a lot or sub-chapter with its hierarchical code.
pub struct CreateLotUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl CreateLotUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		input: LotInput,
		created_by: i64,
	) -> Result<LotDevis, DevisError> {
		devis_modifiable(&self.devis_repo, devis_id).await?;

		let lots = self.lot_repo.find_by_devis(devis_id).await?;
		let parent_code = match input.parent_id {
			Some(parent_id) => {
				let parent = lots
					.iter()
					.find(|l| l.id == Some(parent_id))
					.ok_or(DevisError::LotNotFound { lot_id: parent_id })?;
				Some(parent.code_lot.clone())
			}
			None => None,
		};
		let ordre = lots
			.iter()
			.filter(|l| l.parent_id == input.parent_id)
			.count();
		let code = NumerotationService::generer_code_lot(ordre, parent_code.as_deref());

		let mut lot = LotDevis::new(devis_id, code, input.libelle, ordre as i32)?;
		lot.parent_id = input.parent_id;
		lot.taux_marge_lot = input.taux_marge_lot;
		lot.created_by = Some(created_by);
		let lot = self.lot_repo.save(lot).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"creation_lot",
				Some(created_by),
				Some(json!({ "code_lot": lot.code_lot, "libelle": lot.libelle })),
			)?)
			.await?;
		Ok(lot)
	}
}

/// Soft-deletes a lot, its sub-chapters and their lines.
pub struct DeleteLotUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl DeleteLotUseCase {
	#[instrument(skip_all, fields(lot_id))]
	pub async fn execute(&self, lot_id: i64, deleted_by: i64) -> Result<(), DevisError> {
		let lot = self
			.lot_repo
			.find_by_id(lot_id)
			.await?
			.ok_or(DevisError::LotNotFound { lot_id })?;
		devis_modifiable(&self.devis_repo, lot.devis_id).await?;

		// Depth-first sweep over the sub-tree
		let lots = self.lot_repo.find_by_devis(lot.devis_id).await?;
		let mut a_supprimer = vec![lot_id];
		let mut pile = vec![lot_id];
		while let Some(courant) = pile.pop() {
			for fils in lots.iter().filter(|l| l.parent_id == Some(courant)) {
				let fils_id = fils.id.unwrap_or_default();
				a_supprimer.push(fils_id);
				pile.push(fils_id);
			}
		}
		for id in &a_supprimer {
			for ligne in self.ligne_repo.find_by_lot(*id).await? {
				self.ligne_repo
					.delete(ligne.id.unwrap_or_default(), deleted_by)
					.await?;
			}
			self.lot_repo.delete(*id, deleted_by).await?;
		}

		self.journal_repo
			.save(JournalDevis::new(
				lot.devis_id,
				"suppression_lot",
				Some(deleted_by),
				Some(json!({
					"code_lot": lot.code_lot,
					"nb_lots_supprimes": a_supprimer.len(),
				})),
			)?)
			.await?;
		Ok(())
	}
}

/// Creates a line under a lot, optionally seeded from an article.
pub struct CreateLigneUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
	pub article_repo: Arc<dyn ArticleRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl CreateLigneUseCase {
	#[instrument(skip_all, fields(lot_id))]
	pub async fn execute(
		&self,
		lot_id: i64,
		input: LigneInput,
		created_by: i64,
	) -> Result<LigneDevis, DevisError> {
		let lot = self
			.lot_repo
			.find_by_id(lot_id)
			.await?
			.ok_or(DevisError::LotNotFound { lot_id })?;
		let devis = devis_modifiable(&self.devis_repo, lot.devis_id).await?;

		// An article reference seeds the fields the input leaves empty
		let article = match input.article_id {
			Some(article_id) => Some(
				self.article_repo
					.find_by_id(article_id)
					.await?
					.ok_or(DevisError::ArticleNotFound { article_id })?,
			),
			None => None,
		};

		let libelle = input
			.libelle
			.or_else(|| article.as_ref().map(|a| a.libelle.clone()))
			.ok_or_else(|| {
				DevisError::Validation("Le libelle de la ligne est obligatoire".into())
			})?;
		let unite = input
			.unite
			.or_else(|| article.as_ref().map(|a| a.unite))
			.unwrap_or(UniteArticle::U);
		let prix_unitaire = input
			.prix_unitaire_ht
			.or_else(|| article.as_ref().map(|a| a.prix_unitaire_ht))
			.unwrap_or(Decimal::ZERO);
		let taux_tva = match input.taux_tva {
			Some(taux) => taux,
			None => TauxTVA::new(devis.taux_tva_defaut)?,
		};

		let ordre = self.ligne_repo.find_by_lot(lot_id).await?.len() as i32;
		let quantite = input.quantite.unwrap_or(Decimal::ZERO);
		let mut ligne = LigneDevis::new(lot_id, libelle, unite, quantite, prix_unitaire, taux_tva)?;
		ligne.article_id = input.article_id;
		ligne.taux_marge_ligne = input.taux_marge_ligne;
		ligne.ordre = ordre;
		ligne.created_by = Some(created_by);
		let ligne = self.ligne_repo.save(ligne).await?;
		let ligne_id = ligne.id.unwrap();

		if let Some(debourses) = input.debourses {
			let details = debourses
				.into_iter()
				.map(|d| {
					DebourseDetail::new(ligne_id, d.nature, d.libelle, d.quantite, d.prix_unitaire)
				})
				.collect::<Result<Vec<_>, _>>()?;
			self.debourse_repo.replace_for_ligne(ligne_id, details).await?;
		}

		self.journal_repo
			.save(JournalDevis::new(
				lot.devis_id,
				"creation_ligne",
				Some(created_by),
				Some(json!({ "lot": lot.code_lot, "libelle": ligne.libelle })),
			)?)
			.await?;
		Ok(ligne)
	}
}

/// Updates a line; locked lines refuse quantity changes.
pub struct UpdateLigneUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl UpdateLigneUseCase {
	#[instrument(skip_all, fields(ligne_id))]
	pub async fn execute(
		&self,
		ligne_id: i64,
		input: LigneInput,
		updated_by: i64,
	) -> Result<LigneDevis, DevisError> {
		let mut ligne = self
			.ligne_repo
			.find_by_id(ligne_id)
			.await?
			.ok_or(DevisError::LigneNotFound { ligne_id })?;
		let lot = self
			.lot_repo
			.find_by_id(ligne.lot_devis_id)
			.await?
			.ok_or(DevisError::LotNotFound {
				lot_id: ligne.lot_devis_id,
			})?;
		devis_modifiable(&self.devis_repo, lot.devis_id).await?;

		if let Some(libelle) = input.libelle {
			ligne.libelle = libelle;
		}
		if let Some(unite) = input.unite {
			ligne.unite = unite;
		}
		if let Some(quantite) = input.quantite {
			if quantite != ligne.quantite {
				ligne.modifier_quantite(quantite)?;
			}
		}
		if let Some(prix) = input.prix_unitaire_ht {
			if prix < Decimal::ZERO {
				return Err(DevisError::Validation(
					"Le prix unitaire HT ne peut pas etre negatif".into(),
				));
			}
			ligne.prix_unitaire_ht = prix;
		}
		if let Some(taux) = input.taux_tva {
			ligne.taux_tva = taux;
		}
		if input.taux_marge_ligne.is_some() {
			ligne.taux_marge_ligne = input.taux_marge_ligne;
		}
		let ligne = self.ligne_repo.save(ligne).await?;

		if let Some(debourses) = input.debourses {
			// Wholesale replacement of the discharge details
			let details = debourses
				.into_iter()
				.map(|d| {
					DebourseDetail::new(ligne_id, d.nature, d.libelle, d.quantite, d.prix_unitaire)
				})
				.collect::<Result<Vec<_>, _>>()?;
			self.debourse_repo.replace_for_ligne(ligne_id, details).await?;
		}

		self.journal_repo
			.save(JournalDevis::new(
				lot.devis_id,
				"modification_ligne",
				Some(updated_by),
				Some(json!({ "ligne_id": ligne_id })),
			)?)
			.await?;
		Ok(ligne)
	}
}

/// Soft-deletes a line and drops its discharge details.
pub struct DeleteLigneUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl DeleteLigneUseCase {
	#[instrument(skip_all, fields(ligne_id))]
	pub async fn execute(&self, ligne_id: i64, deleted_by: i64) -> Result<(), DevisError> {
		let ligne = self
			.ligne_repo
			.find_by_id(ligne_id)
			.await?
			.ok_or(DevisError::LigneNotFound { ligne_id })?;
		let lot = self
			.lot_repo
			.find_by_id(ligne.lot_devis_id)
			.await?
			.ok_or(DevisError::LotNotFound {
				lot_id: ligne.lot_devis_id,
			})?;
		devis_modifiable(&self.devis_repo, lot.devis_id).await?;

		self.ligne_repo.delete(ligne_id, deleted_by).await?;
		self.debourse_repo.delete_by_ligne(ligne_id).await?;

		self.journal_repo
			.save(JournalDevis::new(
				lot.devis_id,
				"suppression_ligne",
				Some(deleted_by),
				Some(json!({ "ligne_id": ligne_id, "libelle": ligne.libelle })),
			)?)
			.await?;
		Ok(())
	}
}

/// Recomputes every lot code of a quote depth-first after a reorder.
pub struct RenumeroterDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl RenumeroterDevisUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64, updated_by: i64) -> Result<Vec<LotDevis>, DevisError> {
		devis_modifiable(&self.devis_repo, devis_id).await?;
		let lots = self.lot_repo.find_by_devis(devis_id).await?;
		let codes: HashMap<i64, String> = NumerotationService::renumeroter_arbre(&lots)
			.into_iter()
			.collect();

		let mut renumerotes = Vec::with_capacity(lots.len());
		for mut lot in lots {
			if let Some(code) = codes.get(&lot.id.unwrap_or_default()) {
				lot.code_lot = code.clone();
			}
			renumerotes.push(self.lot_repo.save(lot).await?);
		}
		renumerotes.sort_by(|a, b| a.code_lot.cmp(&b.code_lot));

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"renumerotation",
				Some(updated_by),
				Some(json!({ "nb_lots": renumerotes.len() })),
			)?)
			.await?;
		Ok(renumerotes)
	}
}

/// One lot of the structure projection, lines carrying their codes.
#[derive(Debug, Clone)]
pub struct LotStructure {
	pub lot: LotDevis,
	pub lignes: Vec<(String, LigneDevis)>,
	pub sous_lots: Vec<LotStructure>,
}

/// Reads the full quote tree with line codes.
pub struct GetStructureDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
}

impl GetStructureDevisUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<Vec<LotStructure>, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		let lots = self.lot_repo.find_by_devis(devis_id).await?;

		let mut lignes_par_lot: HashMap<i64, Vec<LigneDevis>> = HashMap::new();
		for lot in &lots {
			let lot_id = lot.id.unwrap_or_default();
			lignes_par_lot.insert(lot_id, self.ligne_repo.find_by_lot(lot_id).await?);
		}

		fn construire(
			parent: Option<i64>,
			lots: &[LotDevis],
			lignes_par_lot: &HashMap<i64, Vec<LigneDevis>>,
		) -> Vec<LotStructure> {
			lots.iter()
				.filter(|l| l.parent_id == parent)
				.map(|lot| {
					let lot_id = lot.id.unwrap_or_default();
					let lignes = lignes_par_lot
						.get(&lot_id)
						.cloned()
						.unwrap_or_default()
						.into_iter()
						.enumerate()
						.map(|(i, ligne)| {
							(
								NumerotationService::generer_code_ligne(i, &lot.code_lot),
								ligne,
							)
						})
						.collect();
					LotStructure {
						lot: lot.clone(),
						lignes,
						sous_lots: construire(Some(lot_id), lots, lignes_par_lot),
					}
				})
				.collect()
		}

		Ok(construire(None, &lots, &lignes_par_lot))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::MemoryStores;

	async fn devis(s: &Arc<MemoryStores>) -> i64 {
		s.devis
			.save(Devis::new("DEV-2026-001", "Client").unwrap())
			.await
			.unwrap()
			.id
			.unwrap()
	}

	fn create_lot(s: &Arc<MemoryStores>) -> CreateLotUseCase {
		CreateLotUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	fn create_ligne(s: &Arc<MemoryStores>) -> CreateLigneUseCase {
		CreateLigneUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			debourse_repo: s.debourses.clone(),
			article_repo: s.articles.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	#[tokio::test]
	async fn test_codes_hierarchiques() {
		let s = stores();
		let devis_id = devis(&s).await;
		let uc = create_lot(&s);

		let racine = uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Gros oeuvre".into(),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		assert_eq!(racine.code_lot, "1");

		let enfant1 = uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Fondations".into(),
					parent_id: racine.id,
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		assert_eq!(enfant1.code_lot, "1.1");

		let enfant2 = uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Elevation".into(),
					parent_id: racine.id,
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		assert_eq!(enfant2.code_lot, "1.2");
	}

	#[tokio::test]
	async fn test_structure_avec_codes_lignes() {
		let s = stores();
		let devis_id = devis(&s).await;
		let lot_uc = create_lot(&s);
		let ligne_uc = create_ligne(&s);

		let racine = lot_uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Lot 1".into(),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		let enfant = lot_uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Sous-lot".into(),
					parent_id: racine.id,
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		for nom in ["a", "b", "c"] {
			ligne_uc
				.execute(
					enfant.id.unwrap(),
					LigneInput {
						libelle: Some(nom.into()),
						quantite: Some(dec("1")),
						prix_unitaire_ht: Some(dec("10")),
						..Default::default()
					},
					1,
				)
				.await
				.unwrap();
		}

		let structure = GetStructureDevisUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
		}
		.execute(devis_id)
		.await
		.unwrap();

		assert_eq!(structure.len(), 1);
		let sous_lot = &structure[0].sous_lots[0];
		let codes: Vec<&str> = sous_lot.lignes.iter().map(|(c, _)| c.as_str()).collect();
		assert_eq!(codes, ["1.1.01", "1.1.02", "1.1.03"]);
	}

	#[tokio::test]
	async fn test_ligne_depuis_article() {
		use btp_types::{Article, CategorieArticle};
		let s = stores();
		let devis_id = devis(&s).await;
		let lot = create_lot(&s)
			.execute(
				devis_id,
				LotInput {
					libelle: "Lot".into(),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		let article = s
			.articles
			.save(
				Article::new(
					"GO-001",
					"Beton C25/30",
					UniteArticle::M3,
					dec("120"),
					CategorieArticle::GrosOeuvre,
				)
				.unwrap(),
			)
			.await
			.unwrap();

		let ligne = create_ligne(&s)
			.execute(
				lot.id.unwrap(),
				LigneInput {
					quantite: Some(dec("3")),
					article_id: article.id,
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		assert_eq!(ligne.libelle, "Beton C25/30");
		assert_eq!(ligne.unite, UniteArticle::M3);
		assert_eq!(ligne.prix_unitaire_ht, dec("120"));
	}

	#[tokio::test]
	async fn test_suppression_lot_recursive() {
		let s = stores();
		let devis_id = devis(&s).await;
		let lot_uc = create_lot(&s);
		let racine = lot_uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Racine".into(),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();
		lot_uc
			.execute(
				devis_id,
				LotInput {
					libelle: "Fils".into(),
					parent_id: racine.id,
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();

		DeleteLotUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			journal_repo: s.journal.clone(),
		}
		.execute(racine.id.unwrap(), 1)
		.await
		.unwrap();

		assert!(s.lots.find_by_devis(devis_id).await.unwrap().is_empty());
	}
}
