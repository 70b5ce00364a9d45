//! Relance use cases: planning, batch execution, cancellation and
//! per-quote configuration.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

use btp_storage::{
	DevisRepository, JournalDevisRepository, RelanceDevisRepository,
};
use btp_types::{
	ConfigRelances, DevisError, JournalDevis, RelanceDevis, StatutDevis,
};

use crate::ports::NotificationTransport;

const STATUTS_RELANCABLES: [StatutDevis; 3] = [
	StatutDevis::Envoye,
	StatutDevis::Vu,
	StatutDevis::EnNegociation,
];

/// Plans the remaining relances of a sent quote.
///
/// One relance is created per configured delay not yet consumed by a
/// sent relance; dates offset from the quote's send timestamp.
pub struct PlanifierRelancesUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub relance_repo: Arc<dyn RelanceDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl PlanifierRelancesUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		message_personnalise: Option<String>,
		planifie_par: i64,
	) -> Result<Vec<RelanceDevis>, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		if !STATUTS_RELANCABLES.contains(&devis.statut) {
			return Err(DevisError::RelanceValidation(format!(
				"Le devis {} doit etre en statut 'envoye', 'vu' ou 'en_negociation' \
				 pour planifier des relances (statut actuel: {})",
				devis.numero,
				devis.statut.label()
			)));
		}

		let existantes = self.relance_repo.find_planifiees_by_devis(devis_id).await?;
		if !existantes.is_empty() {
			return Err(DevisError::RelanceValidation(format!(
				"Le devis {} a deja {} relance(s) planifiee(s)",
				devis.numero,
				existantes.len()
			)));
		}

		let config = &devis.config_relances;
		if !config.actif() {
			return Err(DevisError::RelanceValidation(format!(
				"Les relances sont desactivees pour le devis {}",
				devis.numero
			)));
		}

		// Delays already consumed by sent relances stay consumed
		let toutes = self.relance_repo.find_by_devis(devis_id).await?;
		let nb_envoyees = toutes.iter().filter(|r| r.est_envoyee()).count();

		let date_reference = devis.updated_at.unwrap_or_else(Utc::now);
		let mut a_creer = Vec::new();
		for index in nb_envoyees..config.nombre_relances() {
			let Some(date_prevue) = config.prochaine_relance(date_reference, index) else {
				break;
			};
			let mut relance = RelanceDevis::new(
				devis_id,
				(index + 1) as u32,
				config.type_relance_defaut(),
				date_prevue,
			)?;
			relance.message_personnalise = message_personnalise.clone();
			a_creer.push(relance);
		}

		if a_creer.is_empty() {
			return Err(DevisError::RelanceValidation(format!(
				"Aucune relance a planifier pour le devis {} \
				 (toutes les relances sont deja effectuees)",
				devis.numero
			)));
		}

		let creees = self.relance_repo.save_batch(a_creer).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"planification_relances",
				Some(planifie_par),
				Some(json!({
					"nb_relances": creees.len(),
					"dates_prevues": creees
						.iter()
						.map(|r| r.date_prevue.to_rfc3339())
						.collect::<Vec<_>>(),
				})),
			)?)
			.await?;

		Ok(creees)
	}
}

/// Outcome of one execution batch.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRelances {
	pub nb_envoyees: u32,
	pub nb_erreurs: u32,
	pub erreurs: Vec<(i64, String)>,
}

/// Sends every planned relance whose date has arrived.
///
/// Failures are collected, never propagated: the store records
/// successful sends only, so a lost send is retried by the next batch.
pub struct ExecuterRelancesUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub relance_repo: Arc<dyn RelanceDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	pub transport: Option<Arc<dyn NotificationTransport>>,
}

impl ExecuterRelancesUseCase {
	#[instrument(skip_all)]
	pub async fn execute(&self) -> Result<ExecutionRelances, DevisError> {
		let maintenant = Utc::now();
		let dues = self.relance_repo.find_planifiees_avant(maintenant).await?;

		let mut resultat = ExecutionRelances::default();
		for mut relance in dues {
			let relance_id = relance.id.unwrap_or_default();

			if let Some(transport) = &self.transport {
				let devis = match self.devis_repo.find_by_id(relance.devis_id).await? {
					Some(devis) => devis,
					None => {
						resultat.nb_erreurs += 1;
						resultat
							.erreurs
							.push((relance_id, "devis introuvable".into()));
						continue;
					}
				};
				if let Err(err) = transport.envoyer_relance(&relance, &devis).await {
					warn!(relance_id, erreur = %err, "envoi de relance en echec");
					resultat.nb_erreurs += 1;
					resultat.erreurs.push((relance_id, err.to_string()));
					continue;
				}
			}

			if let Err(err) = relance.envoyer() {
				resultat.nb_erreurs += 1;
				resultat.erreurs.push((relance_id, err.to_string()));
				continue;
			}
			let relance = self.relance_repo.save(relance).await?;

			self.journal_repo
				.save(JournalDevis::new(
					relance.devis_id,
					"envoi_relance",
					None,
					Some(json!({
						"relance_id": relance.id,
						"numero_relance": relance.numero_relance,
					})),
				)?)
				.await?;
			resultat.nb_envoyees += 1;
		}
		Ok(resultat)
	}
}

/// Cancels every planned relance of a quote.
pub struct AnnulerRelancesUseCase {
	pub relance_repo: Arc<dyn RelanceDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl AnnulerRelancesUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64, annule_par: Option<i64>) -> Result<u32, DevisError> {
		let planifiees = self.relance_repo.find_planifiees_by_devis(devis_id).await?;
		let mut nb_annulees = 0;
		for mut relance in planifiees {
			relance.annuler()?;
			self.relance_repo.save(relance).await?;
			nb_annulees += 1;
		}
		if nb_annulees > 0 {
			self.journal_repo
				.save(JournalDevis::new(
					devis_id,
					"annulation_relances",
					annule_par,
					Some(json!({ "nb_relances": nb_annulees })),
				)?)
				.await?;
		}
		Ok(nb_annulees)
	}
}

/// Replaces a quote's relance configuration.
pub struct UpdateConfigRelancesUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl UpdateConfigRelancesUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		config: ConfigRelances,
		updated_by: i64,
	) -> Result<(), DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		devis.config_relances = config.clone();
		self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"config_relances",
				Some(updated_by),
				Some(json!({
					"delais": config.delais(),
					"actif": config.actif(),
				})),
			)?)
			.await?;
		Ok(())
	}
}
