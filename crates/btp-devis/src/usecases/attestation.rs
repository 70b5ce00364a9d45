//! VAT attestation use cases: eligibility, generation, consultation and
//! signing.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{AttestationTvaRepository, DevisRepository, JournalDevisRepository};
use btp_types::{AttestationTva, DevisError, JournalDevis, TauxTVA};

/// Eligibility report for a reduced-rate attestation.
#[derive(Debug, Clone)]
pub struct EligibiliteTva {
	pub devis_id: i64,
	pub taux_tva: Decimal,
	pub eligible: bool,
	pub type_cerfa: Option<&'static str>,
	pub attestation_existante: bool,
}

/// Checks whether a quote's default rate calls for an attestation.
pub struct VerifierEligibiliteTvaUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub attestation_repo: Arc<dyn AttestationTvaRepository>,
}

impl VerifierEligibiliteTvaUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<EligibiliteTva, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		let taux = TauxTVA::new(devis.taux_tva_defaut)?;
		let attestation_existante =
			self.attestation_repo.find_by_devis(devis_id).await?.is_some();
		Ok(EligibiliteTva {
			devis_id,
			taux_tva: taux.taux(),
			eligible: taux.necessite_attestation(),
			type_cerfa: taux.type_cerfa(),
			attestation_existante,
		})
	}
}

/// Fields describing the building and works, supplied at generation.
#[derive(Debug, Clone, Default)]
pub struct AttestationInput {
	pub adresse_immeuble: Option<String>,
	pub nature_immeuble: Option<String>,
	pub nature_travaux: Option<String>,
	pub description_travaux: Option<String>,
	pub telephone_client: Option<String>,
}

/// Generates the CERFA attestation matching the quote's reduced rate.
pub struct GenererAttestationTvaUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub attestation_repo: Arc<dyn AttestationTvaRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl GenererAttestationTvaUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		input: AttestationInput,
		genere_par: i64,
	) -> Result<AttestationTva, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		let taux = TauxTVA::new(devis.taux_tva_defaut)?;
		let Some(type_cerfa) = taux.type_cerfa() else {
			return Err(DevisError::TvaNonEligible { taux: taux.taux() });
		};
		if self.attestation_repo.find_by_devis(devis_id).await?.is_some() {
			return Err(DevisError::AttestationDejaExistante { devis_id });
		}

		let mut attestation = AttestationTva::new(devis_id, type_cerfa, taux.taux())?;
		attestation.nom_client = devis.client_nom.clone();
		attestation.adresse_client = devis.client_adresse.clone().unwrap_or_default();
		attestation.telephone_client = input
			.telephone_client
			.or_else(|| devis.client_telephone.clone());
		attestation.adresse_immeuble = input
			.adresse_immeuble
			.or_else(|| devis.client_adresse.clone())
			.unwrap_or_default();
		if let Some(nature) = input.nature_immeuble {
			attestation.nature_immeuble = nature;
		}
		if let Some(nature) = input.nature_travaux {
			attestation.nature_travaux = nature;
		}
		attestation.description_travaux = input
			.description_travaux
			.or_else(|| devis.objet.clone())
			.unwrap_or_default();
		attestation.valider_natures()?;
		attestation.generee_at = Some(Utc::now());

		let attestation = self.attestation_repo.save(attestation).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"generation_attestation_tva",
				Some(genere_par),
				Some(json!({
					"type_cerfa": type_cerfa,
					"taux_tva": taux.taux().to_string(),
				})),
			)?)
			.await?;

		Ok(attestation)
	}
}

/// Fetches the attestation of a quote.
pub struct GetAttestationTvaUseCase {
	pub attestation_repo: Arc<dyn AttestationTvaRepository>,
}

impl GetAttestationTvaUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<AttestationTva, DevisError> {
		self.attestation_repo
			.find_by_devis(devis_id)
			.await?
			.ok_or(DevisError::AttestationNotFound { devis_id })
	}
}

/// Signs the attestation on finalization.
pub struct SignerAttestationTvaUseCase {
	pub attestation_repo: Arc<dyn AttestationTvaRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl SignerAttestationTvaUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		signataire: &str,
		signe_par: i64,
	) -> Result<AttestationTva, DevisError> {
		let mut attestation = self
			.attestation_repo
			.find_by_devis(devis_id)
			.await?
			.ok_or(DevisError::AttestationNotFound { devis_id })?;
		attestation.signer(signataire)?;
		let attestation = self.attestation_repo.save(attestation).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"signature_attestation_tva",
				Some(signe_par),
				Some(json!({ "signataire": signataire })),
			)?)
			.await?;
		Ok(attestation)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::MemoryStores;
	use btp_types::Devis;

	async fn devis_taux(s: &Arc<MemoryStores>, taux: &str) -> i64 {
		let mut devis = Devis::new(format!("DEV-2026-{}", taux.replace('.', "")), "Client")
			.unwrap();
		devis.taux_tva_defaut = dec(taux);
		devis.client_adresse = Some("3 rue des Lilas".into());
		devis.objet = Some("Isolation des combles".into());
		s.devis.save(devis).await.unwrap().id.unwrap()
	}

	fn generer(s: &Arc<MemoryStores>) -> GenererAttestationTvaUseCase {
		GenererAttestationTvaUseCase {
			devis_repo: s.devis.clone(),
			attestation_repo: s.attestations.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	#[tokio::test]
	async fn test_taux_55_genere_cerfa_1301() {
		let s = stores();
		let devis_id = devis_taux(&s, "5.5").await;
		let attestation = generer(&s)
			.execute(devis_id, AttestationInput::default(), 1)
			.await
			.unwrap();
		assert_eq!(attestation.type_cerfa, "1301-SD");
		assert_eq!(attestation.taux_tva, dec("5.5"));
	}

	#[tokio::test]
	async fn test_taux_10_genere_cerfa_1300() {
		let s = stores();
		let devis_id = devis_taux(&s, "10").await;
		let attestation = generer(&s)
			.execute(devis_id, AttestationInput::default(), 1)
			.await
			.unwrap();
		assert_eq!(attestation.type_cerfa, "1300-SD");
	}

	#[tokio::test]
	async fn test_taux_20_refuse() {
		let s = stores();
		let devis_id = devis_taux(&s, "20").await;
		let err = generer(&s)
			.execute(devis_id, AttestationInput::default(), 1)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "tva_non_eligible");
	}

	#[tokio::test]
	async fn test_une_seule_attestation() {
		let s = stores();
		let devis_id = devis_taux(&s, "10").await;
		generer(&s)
			.execute(devis_id, AttestationInput::default(), 1)
			.await
			.unwrap();
		let err = generer(&s)
			.execute(devis_id, AttestationInput::default(), 1)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "attestation_tva_deja_existante");
	}

	#[tokio::test]
	async fn test_eligibilite() {
		let s = stores();
		let devis_id = devis_taux(&s, "5.5").await;
		let uc = VerifierEligibiliteTvaUseCase {
			devis_repo: s.devis.clone(),
			attestation_repo: s.attestations.clone(),
		};
		let eligibilite = uc.execute(devis_id).await.unwrap();
		assert!(eligibilite.eligible);
		assert_eq!(eligibilite.type_cerfa, Some("1301-SD"));
		assert!(!eligibilite.attestation_existante);
	}

	#[tokio::test]
	async fn test_signature_attestation() {
		let s = stores();
		let devis_id = devis_taux(&s, "10").await;
		generer(&s)
			.execute(devis_id, AttestationInput::default(), 1)
			.await
			.unwrap();
		let attestation = SignerAttestationTvaUseCase {
			attestation_repo: s.attestations.clone(),
			journal_repo: s.journal.clone(),
		}
		.execute(devis_id, "M. Martin", 1)
		.await
		.unwrap();
		assert!(attestation.est_valide());
		assert!(attestation.date_attestation.is_some());
	}
}
