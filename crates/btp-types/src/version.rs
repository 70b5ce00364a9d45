//! Version and diff kind value objects.

use serde::{Deserialize, Serialize};

/// Kind of a quote version within its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeVersion {
	/// First quote of a family.
	Originale,
	/// Corrected/updated version of the same quote.
	Revision,
	/// Alternative version (economic/standard/premium/alternative).
	Variante,
}

impl TypeVersion {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Originale => "Originale",
			Self::Revision => "Revision",
			Self::Variante => "Variante",
		}
	}

	/// True when this version was cloned from an original.
	pub fn est_copie(&self) -> bool {
		matches!(self, Self::Revision | Self::Variante)
	}
}

/// Valid variant labels with their display names.
pub const LABELS_VARIANTES: [(&str, &str); 4] = [
	("ECO", "Economique"),
	("STD", "Standard"),
	("PREM", "Premium"),
	("ALT", "Alternative"),
];

/// Returns the display name of a variant label, if valid.
pub fn libelle_variante(label: &str) -> Option<&'static str> {
	LABELS_VARIANTES
		.iter()
		.find(|(code, _)| *code == label)
		.map(|(_, libelle)| *libelle)
}

/// Kind of per-line difference between two quote versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeEcart {
	/// Line present only in the target version.
	Ajout,
	/// Line present only in the source version.
	Suppression,
	/// Line present in both versions with differences.
	Modification,
	/// Line identical in both versions.
	Identique,
}

impl TypeEcart {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Ajout => "Ajout",
			Self::Suppression => "Suppression",
			Self::Modification => "Modification",
			Self::Identique => "Identique",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_est_copie() {
		assert!(!TypeVersion::Originale.est_copie());
		assert!(TypeVersion::Revision.est_copie());
		assert!(TypeVersion::Variante.est_copie());
	}

	#[test]
	fn test_labels_variantes() {
		assert_eq!(libelle_variante("ECO"), Some("Economique"));
		assert_eq!(libelle_variante("LUXE"), None);
	}
}
