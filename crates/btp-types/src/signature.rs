//! Electronic signature entity.
//!
//! Simple electronic signature (eIDAS level) with full traceability:
//! timestamp, IP address, user agent and a SHA-512 hash of the quote
//! snapshot at signature time. Revocation is irreversible and recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DevisError;

/// Supported signature capture kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSignature {
	/// Drawn on a touch screen (base64 PNG).
	DessinTactile,
	/// Uploaded scan of a handwritten signature.
	UploadScan,
	/// Typed first/last name.
	NomPrenom,
}

impl TypeSignature {
	pub fn label(&self) -> &'static str {
		match self {
			Self::DessinTactile => "Dessin tactile",
			Self::UploadScan => "Upload scan",
			Self::NomPrenom => "Nom / Prenom",
		}
	}
}

/// An electronic acceptance of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureDevis {
	pub id: Option<i64>,
	pub devis_id: i64,
	pub type_signature: TypeSignature,
	pub signataire_nom: String,
	pub signataire_email: String,
	pub signataire_telephone: Option<String>,
	/// Signature payload (base64 image or typed text).
	pub signature_data: String,
	pub ip_adresse: String,
	pub user_agent: String,
	pub horodatage: DateTime<Utc>,
	/// SHA-512 of the quote snapshot, 128 hex chars.
	pub hash_document: String,
	pub valide: bool,
	pub revoquee_at: Option<DateTime<Utc>>,
	pub revoquee_par: Option<i64>,
	pub motif_revocation: Option<String>,
	pub created_at: Option<DateTime<Utc>>,
}

impl SignatureDevis {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		devis_id: i64,
		type_signature: TypeSignature,
		signataire_nom: impl Into<String>,
		signataire_email: impl Into<String>,
		signature_data: impl Into<String>,
		ip_adresse: impl Into<String>,
		user_agent: impl Into<String>,
		horodatage: DateTime<Utc>,
		hash_document: impl Into<String>,
	) -> Result<Self, DevisError> {
		let signataire_nom = signataire_nom.into();
		let signataire_email = signataire_email.into();
		let signature_data = signature_data.into();
		let ip_adresse = ip_adresse.into();
		let user_agent = user_agent.into();
		let hash_document = hash_document.into();

		if devis_id <= 0 {
			return Err(DevisError::SignatureValidation(
				"L'ID du devis est obligatoire".into(),
			));
		}
		if signataire_nom.trim().is_empty() {
			return Err(DevisError::SignatureValidation(
				"Le nom du signataire est obligatoire".into(),
			));
		}
		if signataire_email.trim().is_empty() {
			return Err(DevisError::SignatureValidation(
				"L'email du signataire est obligatoire".into(),
			));
		}
		if signature_data.trim().is_empty() {
			return Err(DevisError::SignatureValidation(
				"Les donnees de signature sont obligatoires".into(),
			));
		}
		if ip_adresse.len() < 7 {
			return Err(DevisError::SignatureValidation(
				"L'adresse IP est obligatoire (tracabilite eIDAS)".into(),
			));
		}
		if user_agent.trim().is_empty() {
			return Err(DevisError::SignatureValidation(
				"Le user-agent est obligatoire (tracabilite eIDAS)".into(),
			));
		}
		if hash_document.len() != 128 {
			return Err(DevisError::SignatureValidation(
				"Le hash SHA-512 du document est obligatoire (128 caracteres hex)".into(),
			));
		}
		Ok(Self {
			id: None,
			devis_id,
			type_signature,
			signataire_nom,
			signataire_email,
			signataire_telephone: None,
			signature_data,
			ip_adresse,
			user_agent,
			horodatage,
			hash_document,
			valide: true,
			revoquee_at: None,
			revoquee_par: None,
			motif_revocation: None,
			created_at: None,
		})
	}

	/// True when the signature is valid and not revoked.
	pub fn est_valide(&self) -> bool {
		self.valide && self.revoquee_at.is_none()
	}

	/// Revokes the signature. Irreversible; requires a non-empty motive.
	pub fn revoquer(&mut self, par: i64, motif: &str) -> Result<(), DevisError> {
		if self.revoquee_at.is_some() {
			return Err(DevisError::SignatureValidation(
				"La signature est deja revoquee".into(),
			));
		}
		if motif.trim().is_empty() {
			return Err(DevisError::SignatureValidation(
				"Le motif de revocation est obligatoire".into(),
			));
		}
		if par <= 0 {
			return Err(DevisError::SignatureValidation(
				"L'identifiant de l'utilisateur revoquant est obligatoire".into(),
			));
		}
		self.valide = false;
		self.revoquee_at = Some(Utc::now());
		self.revoquee_par = Some(par);
		self.motif_revocation = Some(motif.trim().to_string());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn signature() -> SignatureDevis {
		SignatureDevis::new(
			1,
			TypeSignature::DessinTactile,
			"Jean Dupont",
			"jean@example.com",
			"data:image/png;base64,...",
			"192.168.1.10",
			"Mozilla/5.0",
			Utc::now(),
			"a".repeat(128),
		)
		.unwrap()
	}

	#[test]
	fn test_hash_128_caracteres() {
		let err = SignatureDevis::new(
			1,
			TypeSignature::NomPrenom,
			"Jean Dupont",
			"jean@example.com",
			"Jean Dupont",
			"192.168.1.10",
			"Mozilla/5.0",
			Utc::now(),
			"abc",
		)
		.unwrap_err();
		assert_eq!(err.kind(), "signature_devis_validation");
	}

	#[test]
	fn test_revocation() {
		let mut sig = signature();
		assert!(sig.est_valide());
		sig.revoquer(2, "Erreur de montant").unwrap();
		assert!(!sig.est_valide());
		assert_eq!(sig.motif_revocation.as_deref(), Some("Erreur de montant"));
		// Revoking twice fails
		assert!(sig.revoquer(2, "encore").is_err());
	}

	#[test]
	fn test_motif_obligatoire() {
		let mut sig = signature();
		assert!(sig.revoquer(2, "   ").is_err());
		assert!(sig.est_valide());
	}
}
