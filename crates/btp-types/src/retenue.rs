//! Retention-of-guarantee value object.
//!
//! A percentage of the TTC amount withheld until final acceptance of the
//! works. Allowed rates: 0%, 5%, 10%.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DevisError;
use crate::montant::arrondir_montant;

/// A validated retention-of-guarantee rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct RetenueGarantie(Decimal);

impl RetenueGarantie {
	/// Builds a retention rate, rejecting anything outside {0, 5, 10}.
	pub fn new(taux: Decimal) -> Result<Self, DevisError> {
		let normalise = taux.normalize();
		let autorises = [Decimal::ZERO, Decimal::from(5), Decimal::from(10)];
		if !autorises.iter().any(|t| *t == normalise) {
			return Err(DevisError::RetenueInvalide { taux });
		}
		Ok(Self(normalise))
	}

	/// No retention.
	pub fn aucune() -> Self {
		Self(Decimal::ZERO)
	}

	/// The rate in percent.
	pub fn taux(&self) -> Decimal {
		self.0
	}

	/// Withheld amount for a TTC total, rounded half-up to 2 decimals.
	pub fn calculer_montant(&self, montant_ttc: Decimal) -> Decimal {
		arrondir_montant(montant_ttc * self.0 / Decimal::ONE_HUNDRED)
	}

	/// Net amount payable after retention.
	pub fn montant_net_a_payer(&self, montant_ttc: Decimal) -> Decimal {
		arrondir_montant(montant_ttc) - self.calculer_montant(montant_ttc)
	}
}

impl TryFrom<Decimal> for RetenueGarantie {
	type Error = DevisError;

	fn try_from(taux: Decimal) -> Result<Self, Self::Error> {
		Self::new(taux)
	}
}

impl From<RetenueGarantie> for Decimal {
	fn from(retenue: RetenueGarantie) -> Decimal {
		retenue.0
	}
}

impl fmt::Display for RetenueGarantie {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}%", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	#[test]
	fn test_scenario_retenue() {
		// TTC 12 000.00 with retention 5 -> 600.00 withheld, 11 400.00 net
		let retenue = RetenueGarantie::new(dec("5")).unwrap();
		assert_eq!(retenue.calculer_montant(dec("12000.00")), dec("600.00"));
		assert_eq!(retenue.montant_net_a_payer(dec("12000.00")), dec("11400.00"));
	}

	#[test]
	fn test_montant_plus_net_egale_ttc() {
		for taux in ["0", "5", "10"] {
			let retenue = RetenueGarantie::new(dec(taux)).unwrap();
			let ttc = dec("12345.67");
			assert_eq!(
				retenue.calculer_montant(ttc) + retenue.montant_net_a_payer(ttc),
				ttc
			);
		}
	}

	#[test]
	fn test_taux_invalide() {
		let err = RetenueGarantie::new(dec("7")).unwrap_err();
		assert_eq!(err.kind(), "retenue_garantie_invalide");
	}
}
