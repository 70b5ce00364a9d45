//! Conversion of an accepted quote into an operational work-site.
//!
//! Single synchronous path through the work-site creation port; the
//! conversion event is published afterwards as a post-commit
//! notification. Preconditions: accepted status, a valid signature, not
//! already converted, positive HT amount, at least one lot.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

use btp_storage::{
	DevisRepository, JournalDevisRepository, LotDevisRepository, SignatureDevisRepository,
};
use btp_types::{
	Devis, DevisConvertEvent, DevisError, JournalDevis, LotConversionData, LotDevis,
	StatutDevis,
};

use crate::ports::{
	BudgetCreationData, ChantierCreationData, ChantierCreationPort, ConversionChantierResult,
	EventPublisher, LotBudgetaireCreationData,
};

/// Converts an accepted, signed quote into a work-site with its budget.
pub struct ConvertirDevisEnChantierUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub signature_repo: Arc<dyn SignatureDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub chantier_port: Arc<dyn ChantierCreationPort>,
	pub event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl ConvertirDevisEnChantierUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		converti_par: i64,
	) -> Result<ConversionChantierResult, DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::NonConvertible {
				raison: format!("Le devis {} n'existe pas", devis_id),
			})?;

		self.verifier_preconditions(&devis).await?;

		let lots = self.lot_repo.find_by_devis(devis_id).await?;
		if lots.is_empty() {
			return Err(DevisError::NonConvertible {
				raison: "Le devis doit contenir au moins un lot pour etre converti".into(),
			});
		}

		let chantier_data = Self::chantier_data(&devis);
		let budget_data = Self::budget_data(&devis);
		let lots_data = Self::lots_data(&lots);

		let resultat = match self
			.chantier_port
			.create_chantier_from_devis(chantier_data, budget_data, lots_data)
			.await
		{
			Ok(resultat) => resultat,
			Err(err) => {
				// Preconditions held: the failure is journaled before
				// being surfaced as a conversion error
				self.journal_repo
					.save(JournalDevis::new(
						devis_id,
						"conversion_echec",
						Some(converti_par),
						Some(json!({ "erreur": err.to_string() })),
					)?)
					.await?;
				return Err(DevisError::Conversion(format!(
					"Erreur lors de la conversion du devis {}: {}",
					devis_id, err
				)));
			}
		};

		devis.convertir(resultat.chantier_id.to_string())?;
		let devis = self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"conversion",
				Some(converti_par),
				Some(json!({
					"chantier_id": resultat.chantier_id,
					"code_chantier": resultat.code_chantier,
					"budget_id": resultat.budget_id,
					"nb_lots_transferes": resultat.nb_lots_transferes,
				})),
			)?)
			.await?;

		// Post-commit notification; a publisher failure never undoes a
		// committed conversion
		if let Some(publisher) = &self.event_publisher {
			let event = Self::event(&devis, &lots);
			if let Err(err) = publisher.publish(event).await {
				warn!(devis_id, erreur = %err, "publication de l'evenement de conversion en echec");
			}
		}

		Ok(resultat)
	}

	async fn verifier_preconditions(&self, devis: &Devis) -> Result<(), DevisError> {
		let devis_id = devis.id.unwrap_or_default();
		if devis.statut == StatutDevis::Converti {
			return Err(DevisError::DejaConverti {
				devis_id,
				chantier_ref: devis.chantier_ref.clone().unwrap_or_default(),
			});
		}
		if let Some(chantier_ref) = &devis.chantier_ref {
			return Err(DevisError::DejaConverti {
				devis_id,
				chantier_ref: chantier_ref.clone(),
			});
		}
		if devis.statut != StatutDevis::Accepte {
			return Err(DevisError::NonConvertible {
				raison: format!(
					"Le devis doit etre accepte pour etre converti (statut actuel: {})",
					devis.statut.label()
				),
			});
		}
		match self.signature_repo.find_by_devis(devis_id).await? {
			Some(signature) if signature.est_valide() => {}
			_ => {
				return Err(DevisError::NonConvertible {
					raison: "Le devis doit etre signe avant conversion en chantier".into(),
				});
			}
		}
		if devis.montant_total_ht <= Decimal::ZERO {
			return Err(DevisError::NonConvertible {
				raison: "Le montant du devis doit etre superieur a 0".into(),
			});
		}
		Ok(())
	}

	fn chantier_data(devis: &Devis) -> ChantierCreationData {
		ChantierCreationData {
			nom: devis
				.objet
				.clone()
				.unwrap_or_else(|| format!("Chantier {}", devis.client_nom)),
			adresse: devis
				.client_adresse
				.clone()
				.unwrap_or_else(|| "Adresse a definir".into()),
			description: format!("Chantier cree depuis le devis {}", devis.numero),
			conducteur_ids: devis.conducteur_id.into_iter().collect(),
		}
	}

	fn budget_data(devis: &Devis) -> BudgetCreationData {
		BudgetCreationData {
			montant_initial_ht: devis.montant_total_ht,
			retenue_garantie_pct: devis.retenue_garantie_pct,
			seuil_alerte_pct: Decimal::from(80),
			seuil_validation_achat: Decimal::from(5000),
			devis_id: devis.id.unwrap_or_default(),
		}
	}

	fn lots_data(lots: &[LotDevis]) -> Vec<LotBudgetaireCreationData> {
		lots.iter()
			.map(|lot| LotBudgetaireCreationData {
				code_lot: lot.code_lot.clone(),
				libelle: lot.libelle.clone(),
				unite: "forfait".into(),
				quantite_prevue: Decimal::ONE,
				// Cost side falls back to the sale price when the
				// debourse is absent
				prix_unitaire_ht: if lot.montant_debourse_ht > Decimal::ZERO {
					lot.montant_debourse_ht
				} else {
					lot.montant_vente_ht
				},
				ordre: lot.ordre,
				prix_vente_ht: lot.montant_vente_ht,
			})
			.collect()
	}

	fn event(devis: &Devis, lots: &[LotDevis]) -> DevisConvertEvent {
		DevisConvertEvent {
			devis_id: devis.id.unwrap_or_default(),
			numero: devis.numero.clone(),
			client_nom: devis.client_nom.clone(),
			client_adresse: devis.client_adresse.clone(),
			client_email: devis.client_email.clone(),
			objet: devis.objet.clone(),
			montant_total_ht: devis.montant_total_ht,
			montant_total_ttc: devis.montant_total_ttc,
			retenue_garantie_pct: devis.retenue_garantie_pct,
			lots: lots
				.iter()
				.map(|lot| LotConversionData {
					code_lot: lot.code_lot.clone(),
					libelle: lot.libelle.clone(),
					montant_debourse_ht: lot.montant_debourse_ht,
					montant_vente_ht: lot.montant_vente_ht,
				})
				.collect(),
			commercial_id: devis.commercial_id,
			conducteur_id: devis.conducteur_id,
			date_conversion: Utc::now(),
		}
	}
}
