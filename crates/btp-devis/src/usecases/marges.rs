//! Margin application and consultation use cases.
//!
//! Each apply operation is guarded by quote modifiability, persists the
//! new rate, triggers a totals recompute and journals the change. The
//! read-only view reports, per line, the resolved rate and the level
//! that supplied it.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DebourseDetailRepository, DevisRepository, JournalDevisRepository, LigneDevisRepository,
	LotDevisRepository,
};
use btp_types::{DevisError, JournalDevis};

use crate::services::marge::{MargeService, NiveauMarge};
use crate::usecases::totaux::CalculerTotauxDevisUseCase;

fn verifier_taux(taux: Decimal) -> Result<(), DevisError> {
	if taux < Decimal::ZERO {
		return Err(DevisError::Validation(
			"Le taux de marge ne peut pas etre negatif".into(),
		));
	}
	Ok(())
}

/// Sets the quote-level global margin.
pub struct AppliquerMargeGlobaleUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub totaux: Arc<CalculerTotauxDevisUseCase>,
}

impl AppliquerMargeGlobaleUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		taux: Decimal,
		updated_by: i64,
	) -> Result<(), DevisError> {
		verifier_taux(taux)?;
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		devis.verifier_modifiable()?;
		let ancien = devis.taux_marge_global;
		devis.taux_marge_global = taux;
		self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"marge_globale",
				Some(updated_by),
				Some(json!({
					"ancien_taux": ancien.to_string(),
					"nouveau_taux": taux.to_string(),
				})),
			)?)
			.await?;

		self.totaux.execute(devis_id, updated_by).await?;
		Ok(())
	}
}

/// Sets or clears a lot-level margin.
pub struct AppliquerMargeLotUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub totaux: Arc<CalculerTotauxDevisUseCase>,
}

impl AppliquerMargeLotUseCase {
	#[instrument(skip_all, fields(lot_id))]
	pub async fn execute(
		&self,
		lot_id: i64,
		taux: Option<Decimal>,
		updated_by: i64,
	) -> Result<(), DevisError> {
		if let Some(taux) = taux {
			verifier_taux(taux)?;
		}
		let mut lot = self
			.lot_repo
			.find_by_id(lot_id)
			.await?
			.ok_or(DevisError::LotNotFound { lot_id })?;
		let devis = self
			.devis_repo
			.find_by_id(lot.devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id: lot.devis_id })?;
		devis.verifier_modifiable()?;

		lot.taux_marge_lot = taux;
		let devis_id = lot.devis_id;
		let code_lot = lot.code_lot.clone();
		self.lot_repo.save(lot).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"marge_lot",
				Some(updated_by),
				Some(json!({
					"code_lot": code_lot,
					"taux": taux.map(|t| t.to_string()),
				})),
			)?)
			.await?;

		self.totaux.execute(devis_id, updated_by).await?;
		Ok(())
	}
}

/// Sets or clears a line-level margin.
pub struct AppliquerMargeLigneUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub totaux: Arc<CalculerTotauxDevisUseCase>,
}

impl AppliquerMargeLigneUseCase {
	#[instrument(skip_all, fields(ligne_id))]
	pub async fn execute(
		&self,
		ligne_id: i64,
		taux: Option<Decimal>,
		updated_by: i64,
	) -> Result<(), DevisError> {
		if let Some(taux) = taux {
			verifier_taux(taux)?;
		}
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
		let devis = self
			.devis_repo
			.find_by_id(lot.devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id: lot.devis_id })?;
		devis.verifier_modifiable()?;

		ligne.taux_marge_ligne = taux;
		self.ligne_repo.save(ligne).await?;

		self.journal_repo
			.save(JournalDevis::new(
				lot.devis_id,
				"marge_ligne",
				Some(updated_by),
				Some(json!({
					"ligne_id": ligne_id,
					"taux": taux.map(|t| t.to_string()),
				})),
			)?)
			.await?;

		self.totaux.execute(lot.devis_id, updated_by).await?;
		Ok(())
	}
}

/// Resolved margin of one line, with traceability.
#[derive(Debug, Clone)]
pub struct MargeLigneVue {
	pub ligne_id: i64,
	pub libelle: String,
	pub taux_resolu: Decimal,
	pub niveau: NiveauMarge,
}

/// Read-only view of the margins applied across a quote.
pub struct ConsulterMargesDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
}

impl ConsulterMargesDevisUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<Vec<MargeLigneVue>, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		let mut vues = Vec::new();
		for lot in self.lot_repo.find_by_devis(devis_id).await? {
			for ligne in self.ligne_repo.find_by_lot(lot.id.unwrap_or_default()).await? {
				let debourses = self
					.debourse_repo
					.find_by_ligne(ligne.id.unwrap_or_default())
					.await?;
				let resolue = MargeService::resoudre_marge(
					ligne.taux_marge_ligne,
					lot.taux_marge_lot,
					&devis,
					&debourses,
				);
				vues.push(MargeLigneVue {
					ligne_id: ligne.id.unwrap_or_default(),
					libelle: ligne.libelle.clone(),
					taux_resolu: resolue.taux,
					niveau: resolue.niveau,
				});
			}
		}
		Ok(vues)
	}
}
