//! Cost-buildup service.
//!
//! Aggregates a line's discharge details into per-kind totals and the
//! debourse sec. Used by the totals recompute, the decompose views and
//! margin resolution (to pick the principal kind).

use rust_decimal::Decimal;
use std::collections::HashMap;

use btp_types::{DebourseDetail, TypeDebourse};

/// Per-kind breakdown of a line's direct costs.
#[derive(Debug, Clone, Default)]
pub struct DecomposeDebourse {
	pub ligne_devis_id: i64,
	pub total_moe: Decimal,
	pub total_materiaux: Decimal,
	pub total_sous_traitance: Decimal,
	pub total_materiel: Decimal,
	pub total_deplacement: Decimal,
	/// Detail rows grouped by kind, in input order.
	pub details_par_type: HashMap<TypeDebourse, Vec<DebourseDetail>>,
}

impl DecomposeDebourse {
	/// Total direct cost: the sum of every kind.
	pub fn debourse_sec(&self) -> Decimal {
		self.total_moe
			+ self.total_materiaux
			+ self.total_sous_traitance
			+ self.total_materiel
			+ self.total_deplacement
	}

	pub fn total_pour_type(&self, type_debourse: TypeDebourse) -> Decimal {
		match type_debourse {
			TypeDebourse::Moe => self.total_moe,
			TypeDebourse::Materiaux => self.total_materiaux,
			TypeDebourse::SousTraitance => self.total_sous_traitance,
			TypeDebourse::Materiel => self.total_materiel,
			TypeDebourse::Deplacement => self.total_deplacement,
		}
	}
}

/// Domain service aggregating discharge details.
pub struct DebourseService;

impl DebourseService {
	/// Breaks a line's discharge details down by kind.
	pub fn decomposer(ligne_devis_id: i64, debourses: &[DebourseDetail]) -> DecomposeDebourse {
		let mut result = DecomposeDebourse {
			ligne_devis_id,
			..Default::default()
		};
		for debourse in debourses {
			let montant = debourse.montant_calcule();
			match debourse.nature.type_debourse() {
				TypeDebourse::Moe => result.total_moe += montant,
				TypeDebourse::Materiaux => result.total_materiaux += montant,
				TypeDebourse::SousTraitance => result.total_sous_traitance += montant,
				TypeDebourse::Materiel => result.total_materiel += montant,
				TypeDebourse::Deplacement => result.total_deplacement += montant,
			}
			result
				.details_par_type
				.entry(debourse.nature.type_debourse())
				.or_default()
				.push(debourse.clone());
		}
		result
	}

	/// Debourse sec of a list of discharge details.
	pub fn calculer_debourse_sec(debourses: &[DebourseDetail]) -> Decimal {
		debourses.iter().map(|d| d.montant_calcule()).sum()
	}
}
