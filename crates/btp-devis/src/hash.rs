//! Canonical document hashing for signature integrity.
//!
//! The hash covers a fixed set of quote fields serialized as canonical
//! JSON (keys sorted, non-ASCII preserved) and digested with SHA-512.
//! Any drift between the stored and recomputed hash invalidates the
//! signed document's integrity.

use serde_json::json;
use sha2::{Digest, Sha512};

use btp_types::Devis;

/// Computes the SHA-512 hex digest (128 chars) of the quote's verified
/// fields.
pub fn calculer_hash_devis(devis: &Devis) -> String {
	let donnees = json!({
		"client_adresse": devis.client_adresse,
		"client_email": devis.client_email,
		"client_nom": devis.client_nom,
		"date_validite": devis.date_validite.map(|d| d.to_string()),
		"montant_total_ht": devis.montant_total_ht.to_string(),
		"montant_total_ttc": devis.montant_total_ttc.to_string(),
		"numero": devis.numero,
		"objet": devis.objet,
		"taux_marge_global": devis.taux_marge_global.to_string(),
		"taux_tva_defaut": devis.taux_tva_defaut.to_string(),
	});
	// serde_json maps serialize with sorted keys, giving a canonical form
	let contenu = donnees.to_string();
	let digest = Sha512::digest(contenu.as_bytes());
	hex::encode(digest)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	fn devis() -> Devis {
		let mut d = Devis::new("DEV-2026-001", "Client Test").unwrap();
		d.montant_total_ht = Decimal::from(1000);
		d.montant_total_ttc = Decimal::from(1200);
		d
	}

	#[test]
	fn test_hash_stable() {
		let d = devis();
		let h1 = calculer_hash_devis(&d);
		let h2 = calculer_hash_devis(&d);
		assert_eq!(h1, h2);
		assert_eq!(h1.len(), 128);
	}

	#[test]
	fn test_hash_sensible_aux_champs_verifies() {
		let d = devis();
		let hash_initial = calculer_hash_devis(&d);

		let mut modifie = d.clone();
		modifie.montant_total_ht = Decimal::from(1001);
		assert_ne!(calculer_hash_devis(&modifie), hash_initial);

		// Fields outside the verified set leave the hash unchanged
		let mut notes = d.clone();
		notes.notes = Some("commentaire interne".into());
		assert_eq!(calculer_hash_devis(&notes), hash_initial);
	}

	#[test]
	fn test_non_ascii_preserve() {
		let mut d = devis();
		d.objet = Some("Rénovation énergétique".into());
		let h = calculer_hash_devis(&d);
		assert_eq!(h.len(), 128);
	}
}
