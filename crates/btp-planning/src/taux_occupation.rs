//! Occupancy ratio value object.
//!
//! Built from planned and capacity hours. Buckets: <= 0.6 green
//! "sous-charge"; <= 0.9 cyan "normal"; <= 1.0 amber "optimal"; above
//! red "surcharge" with the alert flag raised. A zero capacity yields a
//! zero ratio and no alert.

use serde::{Deserialize, Serialize};

/// Occupancy bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NiveauOccupation {
	SousCharge,
	Normal,
	Optimal,
	Surcharge,
}

/// A computed occupancy ratio with its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TauxOccupation {
	/// planned / capacity, 0 when the capacity is 0.
	pub valeur: f64,
	pub niveau: NiveauOccupation,
}

impl TauxOccupation {
	/// Computes the ratio from planned and capacity hours.
	pub fn calculer(heures_planifiees: f64, capacite_heures: f64) -> Self {
		let valeur = if capacite_heures > 0.0 {
			heures_planifiees / capacite_heures
		} else {
			0.0
		};
		let niveau = if valeur <= 0.6 {
			NiveauOccupation::SousCharge
		} else if valeur <= 0.9 {
			NiveauOccupation::Normal
		} else if valeur <= 1.0 {
			NiveauOccupation::Optimal
		} else {
			NiveauOccupation::Surcharge
		};
		Self { valeur, niveau }
	}

	pub fn label(&self) -> &'static str {
		match self.niveau {
			NiveauOccupation::SousCharge => "sous-charge",
			NiveauOccupation::Normal => "normal",
			NiveauOccupation::Optimal => "optimal",
			NiveauOccupation::Surcharge => "surcharge",
		}
	}

	pub fn couleur(&self) -> &'static str {
		match self.niveau {
			NiveauOccupation::SousCharge => "#4CAF50",
			NiveauOccupation::Normal => "#00BCD4",
			NiveauOccupation::Optimal => "#FFC107",
			NiveauOccupation::Surcharge => "#F44336",
		}
	}

	/// True above full occupancy.
	pub fn alerte(&self) -> bool {
		self.valeur > 1.0
	}
}
