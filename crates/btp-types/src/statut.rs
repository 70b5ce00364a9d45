//! Quote status state machine.
//!
//! Statuses move along a closed set of edges:
//! brouillon -> en_validation -> envoye -> vu/en_negociation -> accepte,
//! with refuse/perdu/expire branches. Accepte, refuse and perdu are
//! terminal for the commercial pipeline; converti is the operational end
//! state reached from accepte.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::DevisError;

/// Status of a quote in its commercial workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatutDevis {
	Brouillon,
	EnValidation,
	Envoye,
	Vu,
	EnNegociation,
	Accepte,
	Refuse,
	Perdu,
	Expire,
	Converti,
}

// Static transition table - each status maps to its allowed next statuses
static TRANSITIONS: Lazy<HashMap<StatutDevis, HashSet<StatutDevis>>> = Lazy::new(|| {
	use StatutDevis::*;
	let mut m = HashMap::new();
	m.insert(Brouillon, HashSet::from([EnValidation]));
	m.insert(EnValidation, HashSet::from([Brouillon, Envoye]));
	m.insert(
		Envoye,
		HashSet::from([Vu, EnNegociation, Accepte, Refuse, Expire]),
	);
	m.insert(Vu, HashSet::from([EnNegociation, Accepte, Refuse, Expire]));
	m.insert(EnNegociation, HashSet::from([Envoye, Accepte, Refuse, Perdu]));
	m.insert(Accepte, HashSet::from([Converti]));
	m.insert(Refuse, HashSet::new());
	m.insert(Perdu, HashSet::new());
	m.insert(Expire, HashSet::from([EnNegociation]));
	m.insert(Converti, HashSet::new());
	m
});

impl StatutDevis {
	/// Initial status of a freshly created quote.
	pub fn initial() -> Self {
		Self::Brouillon
	}

	/// Display label.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Brouillon => "Brouillon",
			Self::EnValidation => "En validation",
			Self::Envoye => "Envoye",
			Self::Vu => "Vu",
			Self::EnNegociation => "En negociation",
			Self::Accepte => "Accepte",
			Self::Refuse => "Refuse",
			Self::Perdu => "Perdu",
			Self::Expire => "Expire",
			Self::Converti => "Converti",
		}
	}

	/// CSS color associated with the status.
	pub fn couleur(&self) -> &'static str {
		match self {
			Self::Brouillon => "#9E9E9E",
			Self::EnValidation => "#FFC107",
			Self::Envoye => "#2196F3",
			Self::Vu => "#9C27B0",
			Self::EnNegociation => "#FF9800",
			Self::Accepte => "#4CAF50",
			Self::Refuse => "#F44336",
			Self::Perdu => "#795548",
			Self::Expire => "#607D8B",
			Self::Converti => "#00897B",
		}
	}

	/// True when no commercial transition is possible from this status.
	pub fn est_final(&self) -> bool {
		matches!(self, Self::Accepte | Self::Refuse | Self::Perdu | Self::Converti)
	}

	/// True when the quote content may still be edited.
	pub fn est_modifiable(&self) -> bool {
		matches!(self, Self::Brouillon | Self::EnNegociation)
	}

	/// True when the quote is still part of the commercial pipeline.
	pub fn est_actif(&self) -> bool {
		!matches!(self, Self::Refuse | Self::Perdu | Self::Expire)
	}

	/// Returns the set of statuses reachable from this one.
	pub fn transitions_possibles(&self) -> HashSet<StatutDevis> {
		TRANSITIONS.get(self).cloned().unwrap_or_default()
	}

	/// Checks whether the transition to `cible` is allowed.
	pub fn peut_transitionner_vers(&self, cible: StatutDevis) -> bool {
		TRANSITIONS.get(self).is_some_and(|s| s.contains(&cible))
	}

	/// Validates the transition to `cible`, returning it on success.
	pub fn transitionner_vers(&self, cible: StatutDevis) -> Result<StatutDevis, DevisError> {
		if !self.peut_transitionner_vers(cible) {
			return Err(DevisError::TransitionInvalide {
				de: *self,
				vers: cible,
			});
		}
		Ok(cible)
	}
}

impl fmt::Display for StatutDevis {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let code = match self {
			Self::Brouillon => "brouillon",
			Self::EnValidation => "en_validation",
			Self::Envoye => "envoye",
			Self::Vu => "vu",
			Self::EnNegociation => "en_negociation",
			Self::Accepte => "accepte",
			Self::Refuse => "refuse",
			Self::Perdu => "perdu",
			Self::Expire => "expire",
			Self::Converti => "converti",
		};
		write!(f, "{}", code)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cycle_nominal() {
		use StatutDevis::*;
		assert!(Brouillon.peut_transitionner_vers(EnValidation));
		assert!(EnValidation.peut_transitionner_vers(Brouillon));
		assert!(EnValidation.peut_transitionner_vers(Envoye));
		assert!(Envoye.peut_transitionner_vers(Accepte));
		assert!(Vu.peut_transitionner_vers(EnNegociation));
		assert!(EnNegociation.peut_transitionner_vers(Envoye));
		assert!(Expire.peut_transitionner_vers(EnNegociation));
	}

	#[test]
	fn test_statuts_terminaux() {
		use StatutDevis::*;
		assert!(Refuse.transitions_possibles().is_empty());
		assert!(Perdu.transitions_possibles().is_empty());
		assert_eq!(
			Accepte.transitions_possibles(),
			HashSet::from([Converti])
		);
		assert!(Accepte.est_final());
	}

	#[test]
	fn test_transition_interdite() {
		let err = StatutDevis::Brouillon
			.transitionner_vers(StatutDevis::Accepte)
			.unwrap_err();
		assert_eq!(err.kind(), "transition_statut_invalide");
	}

	#[test]
	fn test_resultat_dans_transitions_possibles() {
		// Every accepted transition lands in transitions_possibles()
		use StatutDevis::*;
		for source in [
			Brouillon,
			EnValidation,
			Envoye,
			Vu,
			EnNegociation,
			Accepte,
			Refuse,
			Perdu,
			Expire,
			Converti,
		] {
			for cible in source.transitions_possibles() {
				assert!(source.transitionner_vers(cible).is_ok());
			}
		}
	}

	#[test]
	fn test_modifiable() {
		assert!(StatutDevis::Brouillon.est_modifiable());
		assert!(StatutDevis::EnNegociation.est_modifiable());
		assert!(!StatutDevis::Envoye.est_modifiable());
	}

	#[test]
	fn test_serde_snake_case() {
		let json = serde_json::to_string(&StatutDevis::EnNegociation).unwrap();
		assert_eq!(json, "\"en_negociation\"");
	}
}
