//! Workflow permission guards.
//!
//! A closed table maps each workflow action to the roles allowed to
//! perform it. One extra rule: validating a quote at or above the
//! direction threshold (50 000 EUR HT by default) requires admin.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use btp_types::DevisError;

/// Role identifiers of the platform.
pub const ROLES: [&str; 5] = [
	"admin",
	"conducteur",
	"commercial",
	"chef_chantier",
	"compagnon",
];

/// Default HT threshold above which validation requires admin.
pub const SEUIL_VALIDATION_DIRECTION: i64 = 50_000;

static TRANSITIONS_PAR_ROLE: Lazy<HashMap<&'static str, HashSet<&'static str>>> =
	Lazy::new(|| {
		let mut m = HashMap::new();
		m.insert("soumettre", HashSet::from(["admin", "conducteur", "commercial"]));
		m.insert("valider", HashSet::from(["admin", "conducteur", "commercial"]));
		m.insert("retourner_brouillon", HashSet::from(["admin", "conducteur"]));
		m.insert("envoyer", HashSet::from(["admin", "conducteur", "commercial"]));
		// marquer_vu is also triggered by the system
		m.insert("marquer_vu", HashSet::from(["admin", "conducteur", "commercial"]));
		m.insert("negociation", HashSet::from(["admin", "conducteur", "commercial"]));
		m.insert("accepter", HashSet::from(["admin", "conducteur"]));
		m.insert("refuser", HashSet::from(["admin", "conducteur", "commercial"]));
		m.insert("perdu", HashSet::from(["admin", "conducteur"]));
		// expirer is mostly a system action
		m.insert("expirer", HashSet::from(["admin"]));
		m.insert("convertir", HashSet::from(["admin", "conducteur"]));
		m
	});

/// Permission guards for workflow transitions.
pub struct WorkflowGuards;

impl WorkflowGuards {
	/// Fails unless `role` may perform `transition` on a quote of
	/// `montant_ht`, using the given direction threshold.
	pub fn verifier_transition(
		role: &str,
		transition: &str,
		montant_ht: Option<Decimal>,
		seuil_direction: Decimal,
	) -> Result<(), DevisError> {
		let roles_autorises = TRANSITIONS_PAR_ROLE.get(transition).ok_or_else(|| {
			DevisError::TransitionNonAutorisee {
				role: role.to_string(),
				transition: transition.to_string(),
				raison: format!("Transition '{}' inconnue", transition),
			}
		})?;

		if !roles_autorises.contains(role) {
			let mut roles: Vec<&str> = roles_autorises.iter().copied().collect();
			roles.sort_unstable();
			return Err(DevisError::TransitionNonAutorisee {
				role: role.to_string(),
				transition: transition.to_string(),
				raison: format!(
					"Seuls les roles {} peuvent effectuer cette action",
					roles.join(", ")
				),
			});
		}

		if transition == "valider" {
			if let Some(montant) = montant_ht {
				if montant >= seuil_direction && role != "admin" {
					return Err(DevisError::TransitionNonAutorisee {
						role: role.to_string(),
						transition: transition.to_string(),
						raison: format!(
							"La validation d'un devis >= {} EUR HT necessite le role admin",
							seuil_direction
						),
					});
				}
			}
		}
		Ok(())
	}

	/// Boolean variant of [`Self::verifier_transition`].
	pub fn peut_effectuer_transition(
		role: &str,
		transition: &str,
		montant_ht: Option<Decimal>,
		seuil_direction: Decimal,
	) -> bool {
		Self::verifier_transition(role, transition, montant_ht, seuil_direction).is_ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn seuil() -> Decimal {
		Decimal::from(SEUIL_VALIDATION_DIRECTION)
	}

	#[test]
	fn test_roles_autorises() {
		assert!(WorkflowGuards::verifier_transition("commercial", "soumettre", None, seuil())
			.is_ok());
		assert!(WorkflowGuards::verifier_transition("conducteur", "convertir", None, seuil())
			.is_ok());
		assert!(
			WorkflowGuards::verifier_transition("commercial", "convertir", None, seuil())
				.is_err()
		);
		assert!(
			WorkflowGuards::verifier_transition("compagnon", "soumettre", None, seuil())
				.is_err()
		);
	}

	#[test]
	fn test_seuil_direction() {
		let gros_montant = Some(Decimal::from(60_000));
		assert!(WorkflowGuards::verifier_transition(
			"admin",
			"valider",
			gros_montant,
			seuil()
		)
		.is_ok());
		let err = WorkflowGuards::verifier_transition(
			"conducteur",
			"valider",
			gros_montant,
			seuil(),
		)
		.unwrap_err();
		assert_eq!(err.kind(), "transition_non_autorisee");
		// Below the threshold conducteur validates freely
		assert!(WorkflowGuards::verifier_transition(
			"conducteur",
			"valider",
			Some(Decimal::from(49_999)),
			seuil()
		)
		.is_ok());
	}

	#[test]
	fn test_transition_inconnue() {
		assert!(
			WorkflowGuards::verifier_transition("admin", "teleporter", None, seuil()).is_err()
		);
	}
}
