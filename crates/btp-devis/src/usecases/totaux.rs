//! Totals recompute.
//!
//! For each lot, for each line: rebuild the debourse sec, the cost of
//! revenue, the resolved margin, the derived unit price when discharge
//! details exist, then the HT/TTC amounts. Aggregates roll up to the lot
//! and to the quote, all three levels are persisted, and a journal entry
//! records the aggregate figures. Monetary aggregates are rounded
//! half-up to 2 decimals; unit prices keep 4 decimals.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DebourseDetailRepository, DevisRepository, JournalDevisRepository, LigneDevisRepository,
	LotDevisRepository,
};
use btp_types::{
	arrondir_montant, arrondir_prix, calculer_ttc, DevisError, JournalDevis,
};

use crate::services::marge::MargeService;

/// Aggregate figures returned by the recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct TotauxDevis {
	pub debourse_sec_total: Decimal,
	pub total_ht: Decimal,
	pub total_ttc: Decimal,
}

/// Recomputes every cached amount of a quote.
pub struct CalculerTotauxDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl CalculerTotauxDevisUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64, updated_by: i64) -> Result<TotauxDevis, DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		let mut total_debourse_sec = Decimal::ZERO;
		let mut total_ht = Decimal::ZERO;
		let mut total_ttc = Decimal::ZERO;

		let lots = self.lot_repo.find_by_devis(devis_id).await?;
		for mut lot in lots {
			let lot_id = lot.id.unwrap_or_default();
			let mut lot_debourse_sec = Decimal::ZERO;
			let mut lot_total_ht = Decimal::ZERO;
			let mut lot_total_ttc = Decimal::ZERO;

			let lignes = self.ligne_repo.find_by_lot(lot_id).await?;
			for mut ligne in lignes {
				let debourses = self
					.debourse_repo
					.find_by_ligne(ligne.id.unwrap_or_default())
					.await?;

				let debourse_sec: Decimal =
					debourses.iter().map(|d| d.montant_calcule()).sum();
				ligne.debourse_sec = debourse_sec;
				ligne.prix_revient = MargeService::calculer_prix_revient(
					debourse_sec,
					devis.coefficient_frais_generaux,
				);

				let marge = MargeService::resoudre_marge(
					ligne.taux_marge_ligne,
					lot.taux_marge_lot,
					&devis,
					&debourses,
				);

				// Derive the unit price from the cost buildup only when
				// discharge details exist and the quantity is positive;
				// otherwise the stored unit price stands.
				if debourse_sec > Decimal::ZERO && ligne.quantite > Decimal::ZERO {
					let prix_vente_ligne = MargeService::calculer_prix_vente_ht(
						ligne.prix_revient,
						marge.taux,
					);
					ligne.prix_unitaire_ht =
						arrondir_prix(prix_vente_ligne / ligne.quantite);
				}

				let montant_ht = arrondir_montant(ligne.prix_unitaire_ht * ligne.quantite);
				ligne.total_ht = montant_ht;
				ligne.montant_ttc = calculer_ttc(montant_ht, ligne.taux_tva.taux());

				let montant_ttc = ligne.montant_ttc;
				self.ligne_repo.save(ligne).await?;

				lot_debourse_sec += debourse_sec;
				lot_total_ht += montant_ht;
				lot_total_ttc += montant_ttc;
			}

			lot.montant_debourse_ht = arrondir_montant(lot_debourse_sec);
			lot.montant_vente_ht = arrondir_montant(lot_total_ht);
			lot.montant_vente_ttc = arrondir_montant(lot_total_ttc);
			self.lot_repo.save(lot).await?;

			total_debourse_sec += lot_debourse_sec;
			total_ht += lot_total_ht;
			total_ttc += lot_total_ttc;
		}

		let totaux = TotauxDevis {
			debourse_sec_total: arrondir_montant(total_debourse_sec),
			total_ht: arrondir_montant(total_ht),
			total_ttc: arrondir_montant(total_ttc),
		};

		devis.debourse_sec_total = totaux.debourse_sec_total;
		devis.montant_total_ht = totaux.total_ht;
		devis.montant_total_ttc = totaux.total_ttc;
		self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"recalcul_totaux",
				Some(updated_by),
				Some(json!({
					"debourse_sec_total": totaux.debourse_sec_total.to_string(),
					"total_ht": totaux.total_ht.to_string(),
					"total_ttc": totaux.total_ttc.to_string(),
				})),
			)?)
			.await?;

		Ok(totaux)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::MemoryStores;
	use btp_types::{
		DebourseDetail, Devis, LigneDevis, LotDevis, NatureDebourse, TauxTVA, UniteArticle,
	};

	async fn fixture(s: &Arc<MemoryStores>) -> i64 {
		let devis = s
			.devis
			.save(Devis::new("DEV-2026-001", "Client").unwrap())
			.await
			.unwrap();
		let devis_id = devis.id.unwrap();
		let lot = s
			.lots
			.save(LotDevis::new(devis_id, "1", "Charpente", 0).unwrap())
			.await
			.unwrap();
		let ligne = s
			.lignes
			.save(
				LigneDevis::new(
					lot.id.unwrap(),
					"Poutre HEA",
					UniteArticle::U,
					dec("10"),
					Decimal::ZERO,
					TauxTVA::standard(),
				)
				.unwrap(),
			)
			.await
			.unwrap();
		let ligne_id = ligne.id.unwrap();
		s.debourses
			.replace_for_ligne(
				ligne_id,
				vec![
					DebourseDetail::new(
						ligne_id,
						NatureDebourse::Materiaux,
						"Acier",
						dec("2"),
						dec("50"),
					)
					.unwrap(),
					DebourseDetail::new(
						ligne_id,
						NatureDebourse::Moe {
							metier: Some("charpentier".into()),
							taux_horaire: Some(dec("30")),
						},
						"Pose",
						dec("4"),
						dec("30"),
					)
					.unwrap(),
				],
			)
			.await
			.unwrap();
		devis_id
	}

	fn usecase(s: &Arc<MemoryStores>) -> CalculerTotauxDevisUseCase {
		CalculerTotauxDevisUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			debourse_repo: s.debourses.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	#[tokio::test]
	async fn test_buildup_scenario_complet() {
		// qty 10, debourses [{materiaux 2x50}, {moe 4x30}], overhead 12%,
		// global margin 15%: debourse_sec 220, prix_revient 246.40, line
		// selling price 283.36
		let s = stores();
		let devis_id = fixture(&s).await;
		let totaux = usecase(&s).execute(devis_id, 1).await.unwrap();

		assert_eq!(totaux.debourse_sec_total, dec("220.00"));
		assert_eq!(totaux.total_ht, dec("283.36"));

		let lots = s.lots.find_by_devis(devis_id).await.unwrap();
		let lignes = s.lignes.find_by_lot(lots[0].id.unwrap()).await.unwrap();
		assert_eq!(lignes[0].debourse_sec, dec("220"));
		assert_eq!(lignes[0].prix_revient, dec("246.40"));
		assert_eq!(lignes[0].prix_unitaire_ht, dec("28.3360"));
		assert_eq!(lignes[0].total_ht, dec("283.36"));
		// TTC at the line's own 20% rate
		assert_eq!(lignes[0].montant_ttc, dec("340.03"));

		let devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert_eq!(devis.montant_total_ht, dec("283.36"));
		assert_eq!(devis.montant_total_ht, lots[0].montant_vente_ht);
	}

	#[tokio::test]
	async fn test_journal_contient_les_trois_agregats() {
		let s = stores();
		let devis_id = fixture(&s).await;
		usecase(&s).execute(devis_id, 1).await.unwrap();
		let journal = s.journal.find_by_devis(devis_id).await.unwrap();
		let entree = journal.last().unwrap();
		assert_eq!(entree.action, "recalcul_totaux");
		let details = entree.details_json.as_ref().unwrap();
		assert_eq!(details["total_ht"], "283.36");
		assert_eq!(details["debourse_sec_total"], "220.00");
	}

	#[tokio::test]
	async fn test_ligne_sans_debourse_garde_son_prix() {
		let s = stores();
		let devis = s
			.devis
			.save(Devis::new("DEV-2026-002", "Client").unwrap())
			.await
			.unwrap();
		let devis_id = devis.id.unwrap();
		let lot = s
			.lots
			.save(LotDevis::new(devis_id, "1", "Divers", 0).unwrap())
			.await
			.unwrap();
		s.lignes
			.save(
				LigneDevis::new(
					lot.id.unwrap(),
					"Forfait nettoyage",
					UniteArticle::Forfait,
					dec("1"),
					dec("350"),
					TauxTVA::standard(),
				)
				.unwrap(),
			)
			.await
			.unwrap();

		let totaux = usecase(&s).execute(devis_id, 1).await.unwrap();
		assert_eq!(totaux.total_ht, dec("350.00"));
		assert_eq!(totaux.total_ttc, dec("420.00"));
	}

	#[tokio::test]
	async fn test_totaux_somme_des_lots() {
		// Quote total HT equals the sum of lot totals
		let s = stores();
		let devis_id = fixture(&s).await;
		let lot2 = s
			.lots
			.save(LotDevis::new(devis_id, "2", "Couverture", 1).unwrap())
			.await
			.unwrap();
		s.lignes
			.save(
				LigneDevis::new(
					lot2.id.unwrap(),
					"Tuiles",
					UniteArticle::M2,
					dec("20"),
					dec("45"),
					TauxTVA::standard(),
				)
				.unwrap(),
			)
			.await
			.unwrap();

		let totaux = usecase(&s).execute(devis_id, 1).await.unwrap();
		let lots = s.lots.find_by_devis(devis_id).await.unwrap();
		let somme: Decimal = lots.iter().map(|l| l.montant_vente_ht).sum();
		assert_eq!(totaux.total_ht, somme);
	}
}
