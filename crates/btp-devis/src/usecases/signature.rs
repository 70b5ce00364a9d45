//! Electronic signature use cases: signing, consultation, revocation
//! and integrity verification.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{DevisRepository, JournalDevisRepository, SignatureDevisRepository};
use btp_types::{DevisError, JournalDevis, SignatureDevis, StatutDevis, TypeSignature};

use crate::hash::calculer_hash_devis;

const STATUTS_SIGNABLES: [StatutDevis; 3] = [
	StatutDevis::Envoye,
	StatutDevis::Vu,
	StatutDevis::EnNegociation,
];

/// Input of [`SignerDevisUseCase`].
#[derive(Debug, Clone)]
pub struct SignatureInput {
	pub type_signature: TypeSignature,
	pub signataire_nom: String,
	pub signataire_email: String,
	pub signataire_telephone: Option<String>,
	pub signature_data: String,
	pub ip_adresse: String,
	pub user_agent: String,
}

/// Signs a quote: hashes the document, persists the signature with its
/// traceability fields, accepts the quote and journals the event.
pub struct SignerDevisUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub signature_repo: Arc<dyn SignatureDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl SignerDevisUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		input: SignatureInput,
	) -> Result<SignatureDevis, DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		if !STATUTS_SIGNABLES.contains(&devis.statut) {
			return Err(DevisError::NonSignable {
				devis_id,
				statut: devis.statut,
			});
		}
		if self.signature_repo.find_by_devis(devis_id).await?.is_some() {
			return Err(DevisError::DejaSigne { devis_id });
		}

		let hash_document = calculer_hash_devis(&devis);
		let horodatage = Utc::now();
		let mut signature = SignatureDevis::new(
			devis_id,
			input.type_signature,
			input.signataire_nom.clone(),
			input.signataire_email.clone(),
			input.signature_data,
			input.ip_adresse.clone(),
			input.user_agent,
			horodatage,
			hash_document.clone(),
		)?;
		signature.signataire_telephone = input.signataire_telephone;
		let signature = self.signature_repo.save(signature).await?;

		devis.accepter()?;
		self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"signature_client",
				None,
				Some(json!({
					"signataire_nom": input.signataire_nom,
					"signataire_email": input.signataire_email,
					"ip_adresse": input.ip_adresse,
					"horodatage": horodatage.to_rfc3339(),
					"hash_document": hash_document,
				})),
			)?)
			.await?;

		Ok(signature)
	}
}

/// Fetches the signature of a quote.
pub struct GetSignatureUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub signature_repo: Arc<dyn SignatureDevisRepository>,
}

impl GetSignatureUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<SignatureDevis, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		self.signature_repo
			.find_by_devis(devis_id)
			.await?
			.ok_or(DevisError::SignatureNotFound { devis_id })
	}
}

/// Revokes a signature (admin only) and rolls the quote back to
/// negotiation.
pub struct RevoquerSignatureUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub signature_repo: Arc<dyn SignatureDevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl RevoquerSignatureUseCase {
	#[instrument(skip_all, fields(devis_id, role))]
	pub async fn execute(
		&self,
		devis_id: i64,
		motif: &str,
		role: &str,
		revoque_par: i64,
	) -> Result<SignatureDevis, DevisError> {
		if role != "admin" {
			return Err(DevisError::TransitionNonAutorisee {
				role: role.to_string(),
				transition: "revoquer_signature".into(),
				raison: "Seul le role admin peut revoquer une signature".into(),
			});
		}

		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		let mut signature = self
			.signature_repo
			.find_by_devis(devis_id)
			.await?
			.ok_or(DevisError::SignatureNotFound { devis_id })?;

		signature.revoquer(revoque_par, motif)?;
		let signature = self.signature_repo.save(signature).await?;

		devis.revoquer_acceptation()?;
		self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"revocation_signature",
				Some(revoque_par),
				Some(json!({
					"motif": motif.trim(),
					"signature_id": signature.id,
				})),
			)?)
			.await?;

		Ok(signature)
	}
}

/// Outcome of an integrity verification.
#[derive(Debug, Clone)]
pub struct VerificationSignature {
	pub devis_id: i64,
	pub signature_id: Option<i64>,
	pub est_signee: bool,
	pub est_valide: bool,
	pub hash_actuel: Option<String>,
	pub hash_signature: Option<String>,
	pub hashes_concordent: bool,
	pub message: String,
}

/// Recomputes the document hash and compares it with the one stored at
/// signature time.
pub struct VerifierSignatureUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub signature_repo: Arc<dyn SignatureDevisRepository>,
}

impl VerifierSignatureUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64) -> Result<VerificationSignature, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;

		let Some(signature) = self.signature_repo.find_by_devis(devis_id).await? else {
			return Ok(VerificationSignature {
				devis_id,
				signature_id: None,
				est_signee: false,
				est_valide: false,
				hash_actuel: None,
				hash_signature: None,
				hashes_concordent: false,
				message: "Ce devis n'a pas ete signe electroniquement.".into(),
			});
		};

		let hash_actuel = calculer_hash_devis(&devis);
		let hashes_concordent = hash_actuel == signature.hash_document;

		let message = if !signature.est_valide() {
			"La signature a ete revoquee.".to_string()
		} else if !hashes_concordent {
			"ATTENTION: Le document a ete modifie depuis la signature. \
			 L'integrite du document n'est plus garantie."
				.to_string()
		} else {
			"La signature est valide et le document est intact (hash SHA-512 verifie)."
				.to_string()
		};

		Ok(VerificationSignature {
			devis_id,
			signature_id: signature.id,
			est_signee: true,
			est_valide: signature.est_valide(),
			hash_actuel: Some(hash_actuel),
			hash_signature: Some(signature.hash_document.clone()),
			hashes_concordent,
			message,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::MemoryStores;
	use btp_types::Devis;

	fn input() -> SignatureInput {
		SignatureInput {
			type_signature: TypeSignature::DessinTactile,
			signataire_nom: "Jean Dupont".into(),
			signataire_email: "jean@example.com".into(),
			signataire_telephone: None,
			signature_data: "data:image/png;base64,...".into(),
			ip_adresse: "192.168.1.10".into(),
			user_agent: "Mozilla/5.0".into(),
		}
	}

	async fn devis_envoye(s: &Arc<MemoryStores>) -> i64 {
		let mut devis = Devis::new("DEV-2026-001", "Client").unwrap();
		devis.montant_total_ht = dec("10000");
		devis.montant_total_ttc = dec("12000");
		devis.soumettre_validation().unwrap();
		devis.envoyer().unwrap();
		s.devis.save(devis).await.unwrap().id.unwrap()
	}

	fn signer(s: &Arc<MemoryStores>) -> SignerDevisUseCase {
		SignerDevisUseCase {
			devis_repo: s.devis.clone(),
			signature_repo: s.signatures.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	fn verifier(s: &Arc<MemoryStores>) -> VerifierSignatureUseCase {
		VerifierSignatureUseCase {
			devis_repo: s.devis.clone(),
			signature_repo: s.signatures.clone(),
		}
	}

	#[tokio::test]
	async fn test_signature_accepte_le_devis() {
		let s = stores();
		let devis_id = devis_envoye(&s).await;
		let signature = signer(&s).execute(devis_id, input()).await.unwrap();
		assert_eq!(signature.hash_document.len(), 128);

		let devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert_eq!(devis.statut, StatutDevis::Accepte);

		// A second signature is refused
		let err = signer(&s).execute(devis_id, input()).await.unwrap_err();
		assert_eq!(err.kind(), "devis_deja_signe");
	}

	#[tokio::test]
	async fn test_brouillon_non_signable() {
		let s = stores();
		let devis_id = s
			.devis
			.save(Devis::new("DEV-2026-002", "Client").unwrap())
			.await
			.unwrap()
			.id
			.unwrap();
		let err = signer(&s).execute(devis_id, input()).await.unwrap_err();
		assert_eq!(err.kind(), "devis_non_signable");
	}

	#[tokio::test]
	async fn test_verification_integrite() {
		let s = stores();
		let devis_id = devis_envoye(&s).await;
		signer(&s).execute(devis_id, input()).await.unwrap();

		// Untouched document: hashes match
		let verification = verifier(&s).execute(devis_id).await.unwrap();
		assert!(verification.est_signee);
		assert!(verification.est_valide);
		assert!(verification.hashes_concordent);

		// Drift on a verified field breaks integrity
		let mut devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		devis.montant_total_ht = dec("9999");
		s.devis.save(devis).await.unwrap();
		let verification = verifier(&s).execute(devis_id).await.unwrap();
		assert!(!verification.hashes_concordent);
		assert!(verification.message.contains("modifie"));
	}

	#[tokio::test]
	async fn test_revocation_admin_seulement() {
		let s = stores();
		let devis_id = devis_envoye(&s).await;
		signer(&s).execute(devis_id, input()).await.unwrap();

		let uc = RevoquerSignatureUseCase {
			devis_repo: s.devis.clone(),
			signature_repo: s.signatures.clone(),
			journal_repo: s.journal.clone(),
		};
		let err = uc
			.execute(devis_id, "erreur de montant", "conducteur", 2)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "transition_non_autorisee");

		let signature = uc
			.execute(devis_id, "erreur de montant", "admin", 2)
			.await
			.unwrap();
		assert!(!signature.est_valide());

		// The quote rolls back to negotiation
		let devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert_eq!(devis.statut, StatutDevis::EnNegociation);

		let verification = verifier(&s).execute(devis_id).await.unwrap();
		assert!(verification.est_signee);
		assert!(!verification.est_valide);
	}
}
