//! Site-expense use cases: CRUD and prorata ventilation.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DevisRepository, FraisChantierRepository, JournalDevisRepository, LotDevisRepository,
};
use btp_types::{
	DevisError, FraisChantierDevis, JournalDevis, ModeRepartition, TypeFraisChantier,
};

/// Input of expense creation/update.
#[derive(Debug, Clone, Default)]
pub struct FraisInput {
	pub type_frais: Option<TypeFraisChantier>,
	pub libelle: Option<String>,
	pub montant_ht: Option<Decimal>,
	pub mode_repartition: Option<ModeRepartition>,
	pub taux_tva: Option<Decimal>,
	pub lot_devis_id: Option<i64>,
}

async fn devis_modifiable(
	devis_repo: &Arc<dyn DevisRepository>,
	devis_id: i64,
) -> Result<(), DevisError> {
	let devis = devis_repo
		.find_by_id(devis_id)
		.await?
		.ok_or(DevisError::DevisNotFound { devis_id })?;
	devis.verifier_modifiable()?;
	Ok(())
}

/// Adds a site expense to a quote.
pub struct CreateFraisChantierUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub frais_repo: Arc<dyn FraisChantierRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl CreateFraisChantierUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		input: FraisInput,
		created_by: i64,
	) -> Result<FraisChantierDevis, DevisError> {
		devis_modifiable(&self.devis_repo, devis_id).await?;

		let libelle = input.libelle.ok_or_else(|| {
			DevisError::FraisValidation("Le libelle du frais de chantier est obligatoire".into())
		})?;
		let montant = input.montant_ht.unwrap_or(Decimal::ZERO);
		let mut frais = FraisChantierDevis::new(
			devis_id,
			input.type_frais.unwrap_or(TypeFraisChantier::Autre),
			libelle,
			montant,
		)?;
		if let Some(mode) = input.mode_repartition {
			frais.mode_repartition = mode;
		}
		if let Some(taux) = input.taux_tva {
			frais.taux_tva = taux;
		}
		frais.lot_devis_id = input.lot_devis_id;
		frais.created_by = Some(created_by);
		frais.valider()?;
		let ordre = self.frais_repo.find_by_devis(devis_id).await?.len() as i32;
		frais.ordre = ordre;
		let frais = self.frais_repo.save(frais).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"creation_frais_chantier",
				Some(created_by),
				Some(json!({
					"libelle": frais.libelle,
					"montant_ht": frais.montant_ht.to_string(),
				})),
			)?)
			.await?;
		Ok(frais)
	}
}

/// Updates a site expense.
pub struct UpdateFraisChantierUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub frais_repo: Arc<dyn FraisChantierRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl UpdateFraisChantierUseCase {
	#[instrument(skip_all, fields(frais_id))]
	pub async fn execute(
		&self,
		frais_id: i64,
		input: FraisInput,
		updated_by: i64,
	) -> Result<FraisChantierDevis, DevisError> {
		let mut frais = self
			.frais_repo
			.find_by_id(frais_id)
			.await?
			.ok_or(DevisError::FraisNotFound { frais_id })?;
		devis_modifiable(&self.devis_repo, frais.devis_id).await?;

		if let Some(type_frais) = input.type_frais {
			frais.type_frais = type_frais;
		}
		if let Some(libelle) = input.libelle {
			frais.libelle = libelle;
		}
		if let Some(montant) = input.montant_ht {
			frais.montant_ht = montant;
		}
		if let Some(mode) = input.mode_repartition {
			frais.mode_repartition = mode;
		}
		if let Some(taux) = input.taux_tva {
			frais.taux_tva = taux;
		}
		if input.lot_devis_id.is_some() {
			frais.lot_devis_id = input.lot_devis_id;
		}
		frais.valider()?;
		let frais = self.frais_repo.save(frais).await?;

		self.journal_repo
			.save(JournalDevis::new(
				frais.devis_id,
				"modification_frais_chantier",
				Some(updated_by),
				Some(json!({ "frais_id": frais_id })),
			)?)
			.await?;
		Ok(frais)
	}
}

/// Soft-deletes a site expense.
pub struct DeleteFraisChantierUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub frais_repo: Arc<dyn FraisChantierRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl DeleteFraisChantierUseCase {
	#[instrument(skip_all, fields(frais_id))]
	pub async fn execute(&self, frais_id: i64, deleted_by: i64) -> Result<(), DevisError> {
		let frais = self
			.frais_repo
			.find_by_id(frais_id)
			.await?
			.ok_or(DevisError::FraisNotFound { frais_id })?;
		devis_modifiable(&self.devis_repo, frais.devis_id).await?;
		self.frais_repo.delete(frais_id, deleted_by).await?;

		self.journal_repo
			.save(JournalDevis::new(
				frais.devis_id,
				"suppression_frais_chantier",
				Some(deleted_by),
				Some(json!({ "libelle": frais.libelle })),
			)?)
			.await?;
		Ok(())
	}
}

/// Lists the expenses of a quote.
pub struct ListFraisChantierUseCase {
	pub frais_repo: Arc<dyn FraisChantierRepository>,
}

impl ListFraisChantierUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<Vec<FraisChantierDevis>, DevisError> {
		Ok(self.frais_repo.find_by_devis(devis_id).await?)
	}
}

/// One lot's share in the expense ventilation.
#[derive(Debug, Clone)]
pub struct PartFraisLot {
	pub lot_id: i64,
	pub code_lot: String,
	pub libelle_lot: String,
	pub parts: Vec<(i64, Decimal)>,
	pub total: Decimal,
}

/// Ventilation of a quote's expenses across its lots.
#[derive(Debug, Clone)]
pub struct RepartitionFrais {
	pub devis_id: i64,
	pub total_frais_ht: Decimal,
	pub repartition: Vec<PartFraisLot>,
}

/// Computes the prorata ventilation of the quote's expenses.
pub struct CalculerRepartitionFraisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub frais_repo: Arc<dyn FraisChantierRepository>,
}

impl CalculerRepartitionFraisUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64) -> Result<RepartitionFrais, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		let lots = self.lot_repo.find_by_devis(devis_id).await?;
		let frais = self.frais_repo.find_by_devis(devis_id).await?;

		let total_frais_ht = frais.iter().map(|f| f.montant_ht).sum();
		let mut repartition = Vec::with_capacity(lots.len());
		for lot in &lots {
			let mut parts = Vec::new();
			let mut total = Decimal::ZERO;
			for f in &frais {
				// A pinned expense lands only on its lot
				if let Some(pin) = f.lot_devis_id {
					if Some(pin) != lot.id {
						continue;
					}
				}
				let part = f.calculer_repartition_lot(
					lot.montant_vente_ht,
					devis.montant_total_ht,
				);
				total += part;
				parts.push((f.id.unwrap_or_default(), part));
			}
			repartition.push(PartFraisLot {
				lot_id: lot.id.unwrap_or_default(),
				code_lot: lot.code_lot.clone(),
				libelle_lot: lot.libelle.clone(),
				parts,
				total,
			});
		}

		Ok(RepartitionFrais {
			devis_id,
			total_frais_ht,
			repartition,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::MemoryStores;
	use btp_types::{Devis, LotDevis};

	async fn fixture(s: &Arc<MemoryStores>) -> i64 {
		let mut devis = Devis::new("DEV-2026-001", "Client").unwrap();
		devis.montant_total_ht = dec("2000");
		let devis = s.devis.save(devis).await.unwrap();
		let devis_id = devis.id.unwrap();
		for (code, libelle, vente) in [("1", "Gros oeuvre", "1500"), ("2", "Finitions", "500")] {
			let mut lot = LotDevis::new(devis_id, code, libelle, 0).unwrap();
			lot.montant_vente_ht = dec(vente);
			s.lots.save(lot).await.unwrap();
		}
		devis_id
	}

	fn create(s: &Arc<MemoryStores>) -> CreateFraisChantierUseCase {
		CreateFraisChantierUseCase {
			devis_repo: s.devis.clone(),
			frais_repo: s.frais.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	#[tokio::test]
	async fn test_cycle_crud() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let frais = create(&s)
			.execute(
				devis_id,
				FraisInput {
					type_frais: Some(TypeFraisChantier::ComptePorata),
					libelle: Some("Compte prorata".into()),
					montant_ht: Some(dec("1000")),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();

		let frais = UpdateFraisChantierUseCase {
			devis_repo: s.devis.clone(),
			frais_repo: s.frais.clone(),
			journal_repo: s.journal.clone(),
		}
		.execute(
			frais.id.unwrap(),
			FraisInput {
				montant_ht: Some(dec("1200")),
				..Default::default()
			},
			1,
		)
		.await
		.unwrap();
		assert_eq!(frais.montant_ht, dec("1200"));

		DeleteFraisChantierUseCase {
			devis_repo: s.devis.clone(),
			frais_repo: s.frais.clone(),
			journal_repo: s.journal.clone(),
		}
		.execute(frais.id.unwrap(), 1)
		.await
		.unwrap();
		assert!(s.frais.find_by_devis(devis_id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_repartition_prorata() {
		let s = stores();
		let devis_id = fixture(&s).await;
		create(&s)
			.execute(
				devis_id,
				FraisInput {
					type_frais: Some(TypeFraisChantier::FraisGeneraux),
					libelle: Some("Encadrement".into()),
					montant_ht: Some(dec("1000")),
					mode_repartition: Some(ModeRepartition::ProrataLots),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap();

		let ventilation = CalculerRepartitionFraisUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			frais_repo: s.frais.clone(),
		}
		.execute(devis_id)
		.await
		.unwrap();

		assert_eq!(ventilation.total_frais_ht, dec("1000"));
		// 1500/2000 and 500/2000 of 1000
		assert_eq!(ventilation.repartition[0].total, dec("750.00"));
		assert_eq!(ventilation.repartition[1].total, dec("250.00"));
	}

	#[tokio::test]
	async fn test_frais_fige_refuse() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let mut devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		devis.figer(1).unwrap();
		s.devis.save(devis).await.unwrap();

		let err = create(&s)
			.execute(
				devis_id,
				FraisInput {
					libelle: Some("Base vie".into()),
					montant_ht: Some(dec("100")),
					..Default::default()
				},
				1,
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "version_figee");
	}
}
