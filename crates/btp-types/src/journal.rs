//! Append-only audit journal.
//!
//! Every significant change on a quote produces one entry. Entries are
//! never mutated nor deleted, and are totally ordered per quote by
//! creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DevisError;

/// One audit record of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalDevis {
	pub id: Option<i64>,
	pub devis_id: i64,
	/// Action code: "creation", "recalcul_totaux", "signature_client"...
	pub action: String,
	/// None for system actions (expiration batch, relance batch...).
	pub auteur_id: Option<i64>,
	pub details_json: Option<serde_json::Value>,
	pub created_at: Option<DateTime<Utc>>,
}

impl JournalDevis {
	pub fn new(
		devis_id: i64,
		action: impl Into<String>,
		auteur_id: Option<i64>,
		details_json: Option<serde_json::Value>,
	) -> Result<Self, DevisError> {
		let action = action.into();
		if devis_id <= 0 {
			return Err(DevisError::Validation("L'ID du devis est obligatoire".into()));
		}
		if action.trim().is_empty() {
			return Err(DevisError::Validation("L'action est obligatoire".into()));
		}
		if let Some(auteur) = auteur_id {
			if auteur <= 0 {
				return Err(DevisError::Validation(
					"L'ID de l'auteur doit etre positif ou None pour les actions systeme".into(),
				));
			}
		}
		Ok(Self {
			id: None,
			devis_id,
			action,
			auteur_id,
			details_json,
			created_at: Some(Utc::now()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_action_systeme_sans_auteur() {
		let entree = JournalDevis::new(1, "expiration", None, None).unwrap();
		assert!(entree.auteur_id.is_none());
	}

	#[test]
	fn test_details_json() {
		let entree = JournalDevis::new(
			1,
			"recalcul_totaux",
			Some(7),
			Some(json!({"total_ht": "1200.00"})),
		)
		.unwrap();
		assert_eq!(entree.details_json.unwrap()["total_ht"], "1200.00");
	}

	#[test]
	fn test_auteur_invalide() {
		assert!(JournalDevis::new(1, "creation", Some(0), None).is_err());
		assert!(JournalDevis::new(1, "  ", Some(1), None).is_err());
	}
}
