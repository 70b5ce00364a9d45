//! Craft type value object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PlanningError;

/// Craft categories used to express manpower needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMetier {
	// Generic
	Employe,
	SousTraitant,
	// Specialized trades
	Charpentier,
	Couvreur,
	Electricien,
	// Structural works
	Macon,
	Coffreur,
	Ferrailleur,
	Grutier,
}

impl TypeMetier {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Employe => "Employe",
			Self::SousTraitant => "Sous-traitant",
			Self::Charpentier => "Charpentier",
			Self::Couvreur => "Couvreur",
			Self::Electricien => "Electricien",
			Self::Macon => "Macon",
			Self::Coffreur => "Coffreur",
			Self::Ferrailleur => "Ferrailleur",
			Self::Grutier => "Grutier",
		}
	}

	/// Badge color of the craft.
	pub fn couleur(&self) -> &'static str {
		match self {
			Self::Employe => "#2C3E50",
			Self::SousTraitant => "#E74C3C",
			Self::Charpentier => "#27AE60",
			Self::Couvreur => "#E67E22",
			Self::Electricien => "#EC407A",
			Self::Macon => "#795548",
			Self::Coffreur => "#F1C40F",
			Self::Ferrailleur => "#607D8B",
			Self::Grutier => "#1ABC9C",
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			Self::Employe => "employe",
			Self::SousTraitant => "sous_traitant",
			Self::Charpentier => "charpentier",
			Self::Couvreur => "couvreur",
			Self::Electricien => "electricien",
			Self::Macon => "macon",
			Self::Coffreur => "coffreur",
			Self::Ferrailleur => "ferrailleur",
			Self::Grutier => "grutier",
		}
	}

	/// Parses a craft, tolerating dashes and spaces as separators.
	pub fn from_code(code: &str) -> Result<Self, PlanningError> {
		let normalise = code.to_lowercase().replace(['-', ' '], "_");
		Self::tous()
			.into_iter()
			.find(|m| m.code() == normalise)
			.ok_or_else(|| PlanningError::TypeMetierInvalide(code.to_string()))
	}

	pub fn tous() -> [TypeMetier; 9] {
		[
			Self::Employe,
			Self::SousTraitant,
			Self::Charpentier,
			Self::Couvreur,
			Self::Electricien,
			Self::Macon,
			Self::Coffreur,
			Self::Ferrailleur,
			Self::Grutier,
		]
	}
}

impl fmt::Display for TypeMetier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.code())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_code_tolerant() {
		assert_eq!(TypeMetier::from_code("macon").unwrap(), TypeMetier::Macon);
		assert_eq!(
			TypeMetier::from_code("Sous-Traitant").unwrap(),
			TypeMetier::SousTraitant
		);
		assert_eq!(
			TypeMetier::from_code("sous traitant").unwrap(),
			TypeMetier::SousTraitant
		);
	}

	#[test]
	fn test_code_inconnu() {
		let err = TypeMetier::from_code("soudeur").unwrap_err();
		assert_eq!(err.kind(), "type_metier_invalide");
	}
}
