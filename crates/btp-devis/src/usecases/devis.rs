//! Quote lifecycle use cases: creation, update, deletion, lookups,
//! search and the commercial dashboard.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DevisRepository, JournalDevisRepository, RechercheDevis,
};
use btp_types::{ConfigRelances, Devis, DevisError, JournalDevis, StatutDevis, TauxTVA};

use crate::ports::ChantierTvaResolver;

/// Input of [`CreateDevisUseCase`].
#[derive(Debug, Clone, Default)]
pub struct DevisInput {
	pub client_nom: String,
	pub client_adresse: Option<String>,
	pub client_telephone: Option<String>,
	pub client_email: Option<String>,
	pub chantier_ref: Option<String>,
	pub objet: Option<String>,
	pub date_validite: Option<NaiveDate>,
	pub taux_marge_global: Option<Decimal>,
	pub coefficient_frais_generaux: Option<Decimal>,
	pub taux_tva_defaut: Option<Decimal>,
	pub retenue_garantie_pct: Option<Decimal>,
	pub taux_marge_moe: Option<Decimal>,
	pub taux_marge_materiaux: Option<Decimal>,
	pub taux_marge_sous_traitance: Option<Decimal>,
	pub taux_marge_materiel: Option<Decimal>,
	pub taux_marge_deplacement: Option<Decimal>,
	pub notes: Option<String>,
	pub conditions_generales: Option<String>,
	pub commercial_id: Option<i64>,
	pub conducteur_id: Option<i64>,
	pub config_relances: Option<ConfigRelances>,
}

/// Editable fields of [`UpdateDevisUseCase`]; `None` leaves the field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct DevisUpdate {
	pub client_nom: Option<String>,
	pub client_adresse: Option<String>,
	pub client_telephone: Option<String>,
	pub client_email: Option<String>,
	pub objet: Option<String>,
	pub date_validite: Option<NaiveDate>,
	pub retenue_garantie_pct: Option<Decimal>,
	pub notes: Option<String>,
	pub conditions_generales: Option<String>,
	pub commercial_id: Option<i64>,
	pub conducteur_id: Option<i64>,
}

/// Creates a quote in draft status with an auto-generated number.
pub struct CreateDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
	/// Optional lookup used to pre-fill the default VAT rate from the
	/// chantier context when the caller kept the standard 20%.
	pub tva_resolver: Option<Arc<dyn ChantierTvaResolver>>,
}

impl CreateDevisUseCase {
	#[instrument(skip_all, fields(client = %input.client_nom))]
	pub async fn execute(&self, input: DevisInput, created_by: i64) -> Result<Devis, DevisError> {
		let aujourd_hui = Utc::now().date_naive();
		let numero = self.devis_repo.generate_numero(aujourd_hui.year()).await?;

		let mut taux_tva_defaut = input.taux_tva_defaut.unwrap_or(Decimal::from(20));
		if taux_tva_defaut == Decimal::from(20) {
			// Only pre-fill when the caller kept the standard rate
			if let (Some(chantier_ref), Some(resolver)) =
				(&input.chantier_ref, &self.tva_resolver)
			{
				if let Some(contexte) = resolver.resoudre(chantier_ref).await {
					taux_tva_defaut = TauxTVA::taux_defaut_pour_chantier(
						contexte.type_travaux.as_deref(),
						contexte.batiment_plus_2ans,
						contexte.usage_habitation,
					);
				}
			}
		}

		let mut devis = Devis::new(numero.clone(), input.client_nom)?;
		devis.client_adresse = input.client_adresse;
		devis.client_telephone = input.client_telephone;
		devis.client_email = input.client_email;
		devis.chantier_ref = input.chantier_ref;
		devis.objet = input.objet;
		devis.date_creation = Some(aujourd_hui);
		devis.date_validite = input.date_validite;
		devis.taux_tva_defaut = taux_tva_defaut;
		if let Some(taux) = input.taux_marge_global {
			devis.taux_marge_global = taux;
		}
		if let Some(coeff) = input.coefficient_frais_generaux {
			devis.coefficient_frais_generaux = coeff;
		}
		if let Some(retenue) = input.retenue_garantie_pct {
			devis.retenue_garantie_pct = retenue;
		}
		devis.taux_marge_moe = input.taux_marge_moe;
		devis.taux_marge_materiaux = input.taux_marge_materiaux;
		devis.taux_marge_sous_traitance = input.taux_marge_sous_traitance;
		devis.taux_marge_materiel = input.taux_marge_materiel;
		devis.taux_marge_deplacement = input.taux_marge_deplacement;
		devis.notes = input.notes;
		devis.conditions_generales = input.conditions_generales;
		devis.commercial_id = input.commercial_id;
		devis.conducteur_id = input.conducteur_id;
		if let Some(config) = input.config_relances {
			devis.config_relances = config;
		}
		devis.created_by = Some(created_by);
		devis.valider()?;

		let devis = self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis.id.unwrap(),
				"creation",
				Some(created_by),
				Some(json!({
					"message": format!("Creation du devis {}", numero),
					"objet": devis.objet,
				})),
			)?)
			.await?;

		Ok(devis)
	}
}

/// Updates an editable quote and journals the change.
pub struct UpdateDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl UpdateDevisUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		update: DevisUpdate,
		updated_by: i64,
	) -> Result<Devis, DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		devis.verifier_modifiable()?;

		let mut champs_modifies: Vec<&str> = Vec::new();
		macro_rules! appliquer {
			($champ:ident, $cible:expr) => {
				if let Some(valeur) = update.$champ {
					$cible = valeur.into();
					champs_modifies.push(stringify!($champ));
				}
			};
		}
		if let Some(nom) = update.client_nom {
			devis.client_nom = nom;
			champs_modifies.push("client_nom");
		}
		appliquer!(client_adresse, devis.client_adresse);
		appliquer!(client_telephone, devis.client_telephone);
		appliquer!(client_email, devis.client_email);
		appliquer!(objet, devis.objet);
		appliquer!(date_validite, devis.date_validite);
		if let Some(retenue) = update.retenue_garantie_pct {
			devis.retenue_garantie_pct = retenue;
			champs_modifies.push("retenue_garantie_pct");
		}
		appliquer!(notes, devis.notes);
		appliquer!(conditions_generales, devis.conditions_generales);
		appliquer!(commercial_id, devis.commercial_id);
		appliquer!(conducteur_id, devis.conducteur_id);

		devis.valider()?;
		let devis = self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"modification",
				Some(updated_by),
				Some(json!({ "champs": champs_modifies })),
			)?)
			.await?;

		Ok(devis)
	}
}

/// Soft-deletes a draft quote.
pub struct DeleteDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl DeleteDevisUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64, deleted_by: i64) -> Result<(), DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		devis.supprimer(deleted_by)?;
		let numero = devis.numero.clone();
		self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"suppression",
				Some(deleted_by),
				Some(json!({ "message": format!("Suppression du devis {}", numero) })),
			)?)
			.await?;
		Ok(())
	}
}

/// Fetches a quote by id.
pub struct GetDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
}

impl GetDevisUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<Devis, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })
	}
}

/// Applies the quote search filter set.
pub struct SearchDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
}

impl SearchDevisUseCase {
	pub async fn execute(&self, filtres: &RechercheDevis) -> Result<Vec<Devis>, DevisError> {
		Ok(self.devis_repo.search(filtres).await?)
	}
}

/// Reads the audit journal of a quote, in insertion order.
pub struct GetJournalDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl GetJournalDevisUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<Vec<JournalDevis>, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		Ok(self.journal_repo.find_by_devis(devis_id).await?)
	}
}

/// Commercial pipeline KPIs.
#[derive(Debug, Clone)]
pub struct DashboardDevis {
	pub compteurs_par_statut: HashMap<StatutDevis, u32>,
	pub nb_total: u32,
	/// HT sum of quotes in the active pipeline (en_validation, envoye,
	/// vu, en_negociation).
	pub total_pipeline_ht: Decimal,
	pub total_accepte_ht: Decimal,
	/// accepted / (accepted + refused + lost), percent, half-up 2dp.
	pub taux_conversion: Decimal,
	pub derniers_devis: Vec<Devis>,
}

/// Builds the commercial dashboard.
pub struct GetDashboardDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
}

impl GetDashboardDevisUseCase {
	#[instrument(skip_all)]
	pub async fn execute(&self) -> Result<DashboardDevis, DevisError> {
		let compteurs = self.devis_repo.count_by_statut().await?;
		let sommes = self.devis_repo.somme_montant_by_statut().await?;

		let nb_total: u32 = compteurs.values().sum();
		let nb_accepte = *compteurs.get(&StatutDevis::Accepte).unwrap_or(&0);
		let nb_refuse = *compteurs.get(&StatutDevis::Refuse).unwrap_or(&0);
		let nb_perdu = *compteurs.get(&StatutDevis::Perdu).unwrap_or(&0);

		let pipeline = [
			StatutDevis::EnValidation,
			StatutDevis::Envoye,
			StatutDevis::Vu,
			StatutDevis::EnNegociation,
		];
		let total_pipeline_ht = pipeline
			.iter()
			.filter_map(|s| sommes.get(s))
			.copied()
			.sum();
		let total_accepte_ht = sommes
			.get(&StatutDevis::Accepte)
			.copied()
			.unwrap_or(Decimal::ZERO);

		let nb_decides = nb_accepte + nb_refuse + nb_perdu;
		let taux_conversion = if nb_decides > 0 {
			(Decimal::from(nb_accepte) / Decimal::from(nb_decides) * Decimal::ONE_HUNDRED)
				.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
		} else {
			Decimal::ZERO
		};

		let derniers_devis = self.devis_repo.find_all(10, 0).await?;

		Ok(DashboardDevis {
			compteurs_par_statut: compteurs,
			nb_total,
			total_pipeline_ht,
			total_accepte_ht,
			taux_conversion,
			derniers_devis,
		})
	}
}
