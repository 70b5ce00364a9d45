//! Monetary rounding helpers.
//!
//! All monetary aggregates are rounded half-up to 2 decimals; unit prices
//! and quantities keep 4 decimals to preserve rounding across margin and
//! VAT application.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a monetary amount half-up to 2 decimals.
pub fn arrondir_montant(montant: Decimal) -> Decimal {
	montant.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a unit price or quantity half-up to 4 decimals.
pub fn arrondir_prix(prix: Decimal) -> Decimal {
	prix.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes a TTC amount from an HT amount and a VAT percentage.
///
/// The VAT share is rounded before the addition so that the displayed
/// HT + TVA = TTC identity holds on printed documents.
pub fn calculer_ttc(montant_ht: Decimal, taux_tva: Decimal) -> Decimal {
	let tva = arrondir_montant(montant_ht * taux_tva / Decimal::ONE_HUNDRED);
	arrondir_montant(montant_ht + tva)
}

/// Computes the VAT share of an HT amount, rounded to 2 decimals.
pub fn calculer_tva(montant_ht: Decimal, taux_tva: Decimal) -> Decimal {
	arrondir_montant(montant_ht * taux_tva / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	#[test]
	fn test_arrondi_demi_superieur() {
		assert_eq!(arrondir_montant(dec("10.005")), dec("10.01"));
		assert_eq!(arrondir_montant(dec("10.004")), dec("10.00"));
	}

	#[test]
	fn test_calcul_ttc() {
		assert_eq!(calculer_ttc(dec("100"), dec("20")), dec("120.00"));
		assert_eq!(calculer_ttc(dec("100"), dec("5.5")), dec("105.50"));
	}

	#[test]
	fn test_ht_plus_tva_egale_ttc() {
		let ht = dec("1234.56");
		let taux = dec("10");
		assert_eq!(
			arrondir_montant(ht) + calculer_tva(ht, taux),
			calculer_ttc(ht, taux)
		);
	}
}
