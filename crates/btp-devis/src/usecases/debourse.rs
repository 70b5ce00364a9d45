//! Decompose views of direct costs, per line and per quote.

use rust_decimal::Decimal;
use std::sync::Arc;

use btp_storage::{
	DebourseDetailRepository, DevisRepository, LigneDevisRepository, LotDevisRepository,
};
use btp_types::{DevisError, TypeDebourse};

use crate::services::debourse::{DebourseService, DecomposeDebourse};

/// Per-kind totals of a whole quote.
#[derive(Debug, Clone, Default)]
pub struct DecomposeDevis {
	pub devis_id: i64,
	pub lignes: Vec<DecomposeDebourse>,
	pub total_moe: Decimal,
	pub total_materiaux: Decimal,
	pub total_sous_traitance: Decimal,
	pub total_materiel: Decimal,
	pub total_deplacement: Decimal,
}

impl DecomposeDevis {
	pub fn debourse_sec_total(&self) -> Decimal {
		self.total_moe
			+ self.total_materiaux
			+ self.total_sous_traitance
			+ self.total_materiel
			+ self.total_deplacement
	}
}

/// Breaks one line's costs down by kind.
pub struct DecomposerDebourseLigneUseCase {
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
}

impl DecomposerDebourseLigneUseCase {
	pub async fn execute(&self, ligne_id: i64) -> Result<DecomposeDebourse, DevisError> {
		self.ligne_repo
			.find_by_id(ligne_id)
			.await?
			.ok_or(DevisError::LigneNotFound { ligne_id })?;
		let debourses = self.debourse_repo.find_by_ligne(ligne_id).await?;
		Ok(DebourseService::decomposer(ligne_id, &debourses))
	}
}

/// Breaks a whole quote's costs down by kind.
pub struct DecomposerDebourseDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
}

impl DecomposerDebourseDevisUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<DecomposeDevis, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		let mut vue = DecomposeDevis {
			devis_id,
			..Default::default()
		};
		for lot in self.lot_repo.find_by_devis(devis_id).await? {
			for ligne in self.ligne_repo.find_by_lot(lot.id.unwrap_or_default()).await? {
				let ligne_id = ligne.id.unwrap_or_default();
				let debourses = self.debourse_repo.find_by_ligne(ligne_id).await?;
				if debourses.is_empty() {
					continue;
				}
				let decompose = DebourseService::decomposer(ligne_id, &debourses);
				vue.total_moe += decompose.total_moe;
				vue.total_materiaux += decompose.total_materiaux;
				vue.total_sous_traitance += decompose.total_sous_traitance;
				vue.total_materiel += decompose.total_materiel;
				vue.total_deplacement += decompose.total_deplacement;
				vue.lignes.push(decompose);
			}
		}
		Ok(vue)
	}
}

/// Per-kind total accessor, mirroring the line-level view.
impl DecomposeDevis {
	pub fn total_pour_type(&self, type_debourse: TypeDebourse) -> Decimal {
		match type_debourse {
			TypeDebourse::Moe => self.total_moe,
			TypeDebourse::Materiaux => self.total_materiaux,
			TypeDebourse::SousTraitance => self.total_sous_traitance,
			TypeDebourse::Materiel => self.total_materiel,
			TypeDebourse::Deplacement => self.total_deplacement,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_types::{
		DebourseDetail, Devis, LigneDevis, LotDevis, NatureDebourse, TauxTVA, UniteArticle,
	};

	#[tokio::test]
	async fn test_decompose_devis() {
		let s = stores();
		let devis = s
			.devis
			.save(Devis::new("DEV-2026-001", "Client").unwrap())
			.await
			.unwrap();
		let devis_id = devis.id.unwrap();
		let lot = s
			.lots
			.save(LotDevis::new(devis_id, "1", "Lot", 0).unwrap())
			.await
			.unwrap();
		for (libelle, nature, q, pu) in [
			("Acier", NatureDebourse::Materiaux, "2", "50"),
			("Grue", NatureDebourse::Materiel, "1", "300"),
		] {
			let ligne = s
				.lignes
				.save(
					LigneDevis::new(
						lot.id.unwrap(),
						libelle,
						UniteArticle::U,
						dec("1"),
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
					vec![DebourseDetail::new(ligne_id, nature, libelle, dec(q), dec(pu))
						.unwrap()],
				)
				.await
				.unwrap();
		}

		let vue = DecomposerDebourseDevisUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			debourse_repo: s.debourses.clone(),
		}
		.execute(devis_id)
		.await
		.unwrap();

		assert_eq!(vue.total_materiaux, dec("100"));
		assert_eq!(vue.total_materiel, dec("300"));
		assert_eq!(vue.debourse_sec_total(), dec("400"));
		assert_eq!(vue.lignes.len(), 2);
	}

	#[tokio::test]
	async fn test_ligne_inconnue() {
		let s = stores();
		let err = DecomposerDebourseLigneUseCase {
			ligne_repo: s.lignes.clone(),
			debourse_repo: s.debourses.clone(),
		}
		.execute(99)
		.await
		.unwrap_err();
		assert_eq!(err.kind(), "ligne_not_found");
	}
}
