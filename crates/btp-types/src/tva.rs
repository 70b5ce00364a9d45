//! VAT rate value object.
//!
//! French BTP rules restrict quote VAT rates to {0, 5.5, 10, 20}. Reduced
//! non-zero rates require a CERFA attestation: 5.5% (energy renovation)
//! binds to CERFA 1301-SD, 10% (plain renovation) to CERFA 1300-SD.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DevisError;
use crate::montant::arrondir_montant;

/// A validated VAT rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TauxTVA(Decimal);

impl TauxTVA {
	/// Allowed rates, in percent.
	pub fn taux_autorises() -> [Decimal; 4] {
		[
			Decimal::ZERO,
			Decimal::new(55, 1),
			Decimal::from(10),
			Decimal::from(20),
		]
	}

	/// Builds a VAT rate, rejecting anything outside the closed set.
	pub fn new(taux: Decimal) -> Result<Self, DevisError> {
		let normalise = taux.normalize();
		if !Self::taux_autorises().iter().any(|t| t.normalize() == normalise) {
			return Err(DevisError::TauxTvaInvalide { taux });
		}
		Ok(Self(normalise))
	}

	/// Standard 20% rate.
	pub fn standard() -> Self {
		Self(Decimal::from(20))
	}

	/// The rate in percent.
	pub fn taux(&self) -> Decimal {
		self.0
	}

	/// True when this rate requires a CERFA attestation (reduced, non-zero).
	pub fn necessite_attestation(&self) -> bool {
		self.0 > Decimal::ZERO && self.0 < Decimal::from(20)
	}

	/// CERFA form number required for this rate, when any.
	pub fn type_cerfa(&self) -> Option<&'static str> {
		if self.0 == Decimal::new(55, 1) {
			Some("1301-SD")
		} else if self.0 == Decimal::from(10) {
			Some("1300-SD")
		} else {
			None
		}
	}

	/// Display label.
	pub fn libelle(&self) -> &'static str {
		if self.0 == Decimal::ZERO {
			"TVA 0% (autoliquidation sous-traitance)"
		} else if self.0 == Decimal::new(55, 1) {
			"TVA reduite 5.5%"
		} else if self.0 == Decimal::from(10) {
			"TVA intermediaire 10%"
		} else {
			"TVA standard 20%"
		}
	}

	/// VAT amount for an HT amount, rounded half-up to 2 decimals.
	pub fn calculer_montant_tva(&self, montant_ht: Decimal) -> Decimal {
		arrondir_montant(montant_ht * self.0 / Decimal::ONE_HUNDRED)
	}

	/// Default rate for a chantier context.
	///
	/// Dwellings older than two years get 5.5% for energy renovation and
	/// 10% for plain renovation; everything else is 20%.
	pub fn taux_defaut_pour_chantier(
		type_travaux: Option<&str>,
		batiment_plus_2ans: Option<bool>,
		usage_habitation: Option<bool>,
	) -> Decimal {
		if batiment_plus_2ans != Some(true) || usage_habitation != Some(true) {
			return Decimal::from(20);
		}
		match type_travaux {
			Some("renovation_energetique") => Decimal::new(55, 1),
			Some("renovation") => Decimal::from(10),
			_ => Decimal::from(20),
		}
	}
}

impl TryFrom<Decimal> for TauxTVA {
	type Error = DevisError;

	fn try_from(taux: Decimal) -> Result<Self, Self::Error> {
		Self::new(taux)
	}
}

impl From<TauxTVA> for Decimal {
	fn from(taux: TauxTVA) -> Decimal {
		taux.0
	}
}

impl fmt::Display for TauxTVA {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}%", self.0)
	}
}
