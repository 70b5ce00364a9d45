//! Margin resolution service.
//!
//! Precedence: line > lot > per-discharge-kind (on the quote) > global.
//! The winning level is reported for traceability. The per-kind lookup
//! uses the line's principal kind: the discharge kind with the greatest
//! monetary weight, ties broken by input order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use btp_types::{DebourseDetail, Devis, TypeDebourse};

/// Hierarchy level that produced a resolved margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NiveauMarge {
	Ligne,
	Lot,
	TypeDebourse,
	Global,
}

/// A resolved margin with the level that supplied it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MargeResolue {
	pub taux: Decimal,
	pub niveau: NiveauMarge,
}

/// Domain service resolving the multi-level margin hierarchy.
pub struct MargeService;

impl MargeService {
	/// Resolves the applicable margin for a line.
	pub fn resoudre_marge(
		ligne_marge: Option<Decimal>,
		lot_marge: Option<Decimal>,
		devis: &Devis,
		debourses: &[DebourseDetail],
	) -> MargeResolue {
		if let Some(taux) = ligne_marge {
			return MargeResolue {
				taux,
				niveau: NiveauMarge::Ligne,
			};
		}
		if let Some(taux) = lot_marge {
			return MargeResolue {
				taux,
				niveau: NiveauMarge::Lot,
			};
		}
		if let Some(type_principal) = Self::type_principal(debourses) {
			if let Some(taux) = devis.taux_marge_pour_type(type_principal) {
				return MargeResolue {
					taux,
					niveau: NiveauMarge::TypeDebourse,
				};
			}
		}
		MargeResolue {
			taux: devis.taux_marge_global,
			niveau: NiveauMarge::Global,
		}
	}

	/// The discharge kind with the greatest monetary weight on the line.
	/// Ties keep the first kind encountered in input order.
	pub fn type_principal(debourses: &[DebourseDetail]) -> Option<TypeDebourse> {
		if debourses.is_empty() {
			return None;
		}
		let mut totaux: Vec<(TypeDebourse, Decimal)> = Vec::new();
		for debourse in debourses {
			let type_debourse = debourse.nature.type_debourse();
			let montant = debourse.montant_calcule();
			match totaux.iter_mut().find(|(t, _)| *t == type_debourse) {
				Some((_, total)) => *total += montant,
				None => totaux.push((type_debourse, montant)),
			}
		}
		// Strictly-greater comparison so the first kind wins on ties
		let mut principal: Option<(TypeDebourse, Decimal)> = None;
		for (type_debourse, total) in totaux {
			match &principal {
				Some((_, max)) if total <= *max => {}
				_ => principal = Some((type_debourse, total)),
			}
		}
		principal.map(|(type_debourse, _)| type_debourse)
	}

	/// Prix de revient = debourse sec x (1 + overhead%).
	pub fn calculer_prix_revient(
		debourse_sec: Decimal,
		coefficient_frais_generaux: Decimal,
	) -> Decimal {
		debourse_sec * (Decimal::ONE + coefficient_frais_generaux / Decimal::ONE_HUNDRED)
	}

	/// Prix de vente HT = prix de revient x (1 + margin%).
	pub fn calculer_prix_vente_ht(prix_revient: Decimal, taux_marge: Decimal) -> Decimal {
		prix_revient * (Decimal::ONE + taux_marge / Decimal::ONE_HUNDRED)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use btp_types::NatureDebourse;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	fn devis() -> Devis {
		Devis::new("DEV-2026-001", "Client").unwrap()
	}

	fn debourse(nature: NatureDebourse, quantite: &str, prix: &str) -> DebourseDetail {
		DebourseDetail::new(1, nature, "detail", dec(quantite), dec(prix)).unwrap()
	}

	#[test]
	fn test_priorite_ligne() {
		let resolue =
			MargeService::resoudre_marge(Some(dec("25")), Some(dec("20")), &devis(), &[]);
		assert_eq!(resolue.taux, dec("25"));
		assert_eq!(resolue.niveau, NiveauMarge::Ligne);
	}

	#[test]
	fn test_priorite_lot() {
		let resolue = MargeService::resoudre_marge(None, Some(dec("20")), &devis(), &[]);
		assert_eq!(resolue.taux, dec("20"));
		assert_eq!(resolue.niveau, NiveauMarge::Lot);
	}

	#[test]
	fn test_priorite_type_debourse() {
		let mut d = devis();
		d.taux_marge_materiaux = Some(dec("18"));
		let debourses = vec![
			debourse(NatureDebourse::Materiaux, "2", "50"),
			debourse(
				NatureDebourse::Moe {
					metier: None,
					taux_horaire: None,
				},
				"1",
				"30",
			),
		];
		let resolue = MargeService::resoudre_marge(None, None, &d, &debourses);
		assert_eq!(resolue.taux, dec("18"));
		assert_eq!(resolue.niveau, NiveauMarge::TypeDebourse);
	}

	#[test]
	fn test_priorite_globale() {
		let resolue = MargeService::resoudre_marge(None, None, &devis(), &[]);
		assert_eq!(resolue.taux, dec("15"));
		assert_eq!(resolue.niveau, NiveauMarge::Global);
	}

	#[test]
	fn test_type_principal_egalite_ordre_saisie() {
		// Equal weights: the first kind in input order wins
		let debourses = vec![
			debourse(NatureDebourse::SousTraitance, "1", "100"),
			debourse(NatureDebourse::Materiaux, "2", "50"),
		];
		assert_eq!(
			MargeService::type_principal(&debourses),
			Some(TypeDebourse::SousTraitance)
		);
	}

	#[test]
	fn test_buildup_complet() {
		// debourse_sec 220, overhead 12% -> 246.40; margin 15% -> 283.36
		let prix_revient = MargeService::calculer_prix_revient(dec("220"), dec("12"));
		assert_eq!(prix_revient, dec("246.40"));
		let prix_vente = MargeService::calculer_prix_vente_ht(prix_revient, dec("15"));
		assert_eq!(prix_vente.round_dp(2), dec("283.36"));
	}
}
