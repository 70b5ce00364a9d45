//! Workflow use cases: role-gated status transitions and the expiration
//! batch.
//!
//! Every transition is checked twice: the permission guard (role table
//! plus the direction threshold on validation) and the entity state
//! machine. Sending a quote plans its relances; reaching a terminal
//! status sweeps the planned ones.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

use btp_storage::{DevisRepository, JournalDevisRepository};
use btp_types::{Devis, DevisError, JournalDevis};

use crate::services::guards::{WorkflowGuards, SEUIL_VALIDATION_DIRECTION};
use crate::usecases::relance::{AnnulerRelancesUseCase, PlanifierRelancesUseCase};

/// Workflow actions, mapped one-to-one onto the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionWorkflow {
	Soumettre,
	Valider,
	RetournerBrouillon,
	Envoyer,
	MarquerVu,
	Negociation,
	Accepter,
	Refuser,
	Perdu,
	Expirer,
}

impl ActionWorkflow {
	/// Key in the permission table.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Soumettre => "soumettre",
			Self::Valider => "valider",
			Self::RetournerBrouillon => "retourner_brouillon",
			Self::Envoyer => "envoyer",
			Self::MarquerVu => "marquer_vu",
			Self::Negociation => "negociation",
			Self::Accepter => "accepter",
			Self::Refuser => "refuser",
			Self::Perdu => "perdu",
			Self::Expirer => "expirer",
		}
	}

	fn appliquer(&self, devis: &mut Devis) -> Result<(), DevisError> {
		match self {
			Self::Soumettre => devis.soumettre_validation(),
			// Validation approves and sends in one step
			Self::Valider => devis.envoyer(),
			Self::RetournerBrouillon => devis.retourner_brouillon(),
			Self::Envoyer => devis.envoyer(),
			Self::MarquerVu => devis.marquer_vu(),
			Self::Negociation => devis.passer_en_negociation(),
			Self::Accepter => devis.accepter(),
			Self::Refuser => devis.refuser(),
			Self::Perdu => devis.marquer_perdu(),
			Self::Expirer => devis.marquer_expire(),
		}
	}

	fn est_envoi(&self) -> bool {
		matches!(self, Self::Envoyer | Self::Valider)
	}

	fn est_terminal(&self) -> bool {
		matches!(self, Self::Accepter | Self::Refuser | Self::Perdu)
	}
}

/// Applies a workflow action to a quote on behalf of a role.
pub struct TransitionDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub planifier_relances: Option<Arc<PlanifierRelancesUseCase>>,
	pub annuler_relances: Option<Arc<AnnulerRelancesUseCase>>,
	/// HT amount above which validation requires admin.
	pub seuil_validation_direction: Decimal,
}

impl TransitionDevisUseCase {
	pub fn seuil_defaut() -> Decimal {
		Decimal::from(SEUIL_VALIDATION_DIRECTION)
	}

	#[instrument(skip_all, fields(devis_id, action = action.as_str(), role))]
	pub async fn execute(
		&self,
		devis_id: i64,
		action: ActionWorkflow,
		role: &str,
		user_id: i64,
	) -> Result<Devis, DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		WorkflowGuards::verifier_transition(
			role,
			action.as_str(),
			Some(devis.montant_total_ht),
			self.seuil_validation_direction,
		)?;

		let ancien_statut = devis.statut;
		action.appliquer(&mut devis)?;
		let devis = self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				action.as_str(),
				Some(user_id),
				Some(json!({
					"de": ancien_statut.to_string(),
					"vers": devis.statut.to_string(),
					"role": role,
				})),
			)?)
			.await?;

		// Relance hooks are best-effort: a planning refusal must not
		// undo a committed transition
		if action.est_envoi() {
			if let Some(planifier) = &self.planifier_relances {
				if let Err(err) = planifier.execute(devis_id, None, user_id).await {
					warn!(devis_id, erreur = %err, "planification de relances ignoree");
				}
			}
		}
		if action.est_terminal() {
			if let Some(annuler) = &self.annuler_relances {
				if let Err(err) = annuler.execute(devis_id, Some(user_id)).await {
					warn!(devis_id, erreur = %err, "annulation de relances ignoree");
				}
			}
		}

		Ok(devis)
	}
}

/// Expires every quote past its validity date (system batch).
pub struct ExpirerDevisBatchUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl ExpirerDevisBatchUseCase {
	#[instrument(skip_all)]
	pub async fn execute(&self) -> Result<u32, DevisError> {
		let aujourd_hui = Utc::now().date_naive();
		let expires = self.devis_repo.find_expires(aujourd_hui).await?;

		let mut nb_expires = 0;
		for mut devis in expires {
			let devis_id = devis.id.unwrap_or_default();
			devis.marquer_expire()?;
			self.devis_repo.save(devis).await?;
			self.journal_repo
				.save(JournalDevis::new(
					devis_id,
					"expiration",
					None,
					Some(json!({ "date": aujourd_hui.to_string() })),
				)?)
				.await?;
			nb_expires += 1;
		}
		Ok(nb_expires)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::{MemoryStores, RelanceDevisRepository};
	use btp_types::StatutDevis;
	use chrono::Duration;

	fn usecase(s: &Arc<MemoryStores>) -> TransitionDevisUseCase {
		TransitionDevisUseCase {
			devis_repo: s.devis.clone(),
			journal_repo: s.journal.clone(),
			planifier_relances: Some(Arc::new(PlanifierRelancesUseCase {
				devis_repo: s.devis.clone(),
				relance_repo: s.relances.clone(),
				journal_repo: s.journal.clone(),
			})),
			annuler_relances: Some(Arc::new(AnnulerRelancesUseCase {
				relance_repo: s.relances.clone(),
				journal_repo: s.journal.clone(),
			})),
			seuil_validation_direction: TransitionDevisUseCase::seuil_defaut(),
		}
	}

	async fn devis(s: &Arc<MemoryStores>) -> i64 {
		s.devis
			.save(Devis::new("DEV-2026-001", "Client").unwrap())
			.await
			.unwrap()
			.id
			.unwrap()
	}

	#[tokio::test]
	async fn test_scenario_workflow() {
		// brouillon -> soumettre -> en_validation -> retour brouillon ->
		// soumettre -> envoyer -> accepter; second accept fails
		let s = stores();
		let devis_id = devis(&s).await;
		let uc = usecase(&s);

		let d = uc
			.execute(devis_id, ActionWorkflow::Soumettre, "commercial", 1)
			.await
			.unwrap();
		assert_eq!(d.statut, StatutDevis::EnValidation);

		let d = uc
			.execute(devis_id, ActionWorkflow::RetournerBrouillon, "conducteur", 1)
			.await
			.unwrap();
		assert_eq!(d.statut, StatutDevis::Brouillon);

		uc.execute(devis_id, ActionWorkflow::Soumettre, "commercial", 1)
			.await
			.unwrap();
		let d = uc
			.execute(devis_id, ActionWorkflow::Envoyer, "commercial", 1)
			.await
			.unwrap();
		assert_eq!(d.statut, StatutDevis::Envoye);

		let d = uc
			.execute(devis_id, ActionWorkflow::Accepter, "conducteur", 1)
			.await
			.unwrap();
		assert_eq!(d.statut, StatutDevis::Accepte);

		let err = uc
			.execute(devis_id, ActionWorkflow::Accepter, "conducteur", 1)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "transition_statut_invalide");
	}

	#[tokio::test]
	async fn test_role_refuse() {
		let s = stores();
		let devis_id = devis(&s).await;
		let err = usecase(&s)
			.execute(devis_id, ActionWorkflow::Soumettre, "compagnon", 1)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "transition_non_autorisee");
		// No transition happened
		let d = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert_eq!(d.statut, StatutDevis::Brouillon);
	}

	#[tokio::test]
	async fn test_validation_gros_montant_admin_seulement() {
		let s = stores();
		let devis_id = devis(&s).await;
		let mut d = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		d.montant_total_ht = dec("60000");
		d.soumettre_validation().unwrap();
		s.devis.save(d).await.unwrap();

		let uc = usecase(&s);
		let err = uc
			.execute(devis_id, ActionWorkflow::Valider, "conducteur", 1)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "transition_non_autorisee");

		let d = uc
			.execute(devis_id, ActionWorkflow::Valider, "admin", 1)
			.await
			.unwrap();
		assert_eq!(d.statut, StatutDevis::Envoye);
	}

	#[tokio::test]
	async fn test_envoi_planifie_les_relances() {
		let s = stores();
		let devis_id = devis(&s).await;
		let uc = usecase(&s);
		uc.execute(devis_id, ActionWorkflow::Soumettre, "admin", 1)
			.await
			.unwrap();
		uc.execute(devis_id, ActionWorkflow::Envoyer, "admin", 1)
			.await
			.unwrap();
		assert_eq!(
			s.relances.find_planifiees_by_devis(devis_id).await.unwrap().len(),
			3
		);

		// Terminal status sweeps them
		uc.execute(devis_id, ActionWorkflow::Refuser, "admin", 1)
			.await
			.unwrap();
		assert!(s
			.relances
			.find_planifiees_by_devis(devis_id)
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test]
	async fn test_batch_expiration() {
		let s = stores();
		let mut d = Devis::new("DEV-2026-009", "Client").unwrap();
		d.date_validite = Some(Utc::now().date_naive() - Duration::days(1));
		d.soumettre_validation().unwrap();
		d.envoyer().unwrap();
		s.devis.save(d).await.unwrap();

		// A quote still inside its validity window is not touched
		let mut valide = Devis::new("DEV-2026-010", "Client").unwrap();
		valide.date_validite = Some(Utc::now().date_naive() + Duration::days(10));
		valide.soumettre_validation().unwrap();
		valide.envoyer().unwrap();
		s.devis.save(valide).await.unwrap();

		let nb = ExpirerDevisBatchUseCase {
			devis_repo: s.devis.clone(),
			journal_repo: s.journal.clone(),
		}
		.execute()
		.await
		.unwrap();
		assert_eq!(nb, 1);
	}
}
