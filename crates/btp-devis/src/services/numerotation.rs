//! Hierarchical numbering service.
//!
//! Deterministic codes for the quote tree:
//! root lots `1`, `2`...; sub-chapters `1.1`, `2.1`...; lines two-digit
//! padded under their lot (`1.1.01`, `2.1.03`). Renumbering after a
//! reorder is a depth-first traversal over a parent-id map.

use std::collections::HashMap;

use btp_types::LotDevis;

/// Domain service generating hierarchical codes.
pub struct NumerotationService;

impl NumerotationService {
	/// Code of a lot at `ordre` (0-based sibling index) under
	/// `parent_code` (None for root lots).
	pub fn generer_code_lot(ordre: usize, parent_code: Option<&str>) -> String {
		match parent_code {
			Some(parent) => format!("{}.{}", parent, ordre + 1),
			None => (ordre + 1).to_string(),
		}
	}

	/// Code of a line at `ordre` (0-based) inside a lot, two-digit padded.
	pub fn generer_code_ligne(ordre: usize, lot_code: &str) -> String {
		format!("{}.{:02}", lot_code, ordre + 1)
	}

	/// Codes for all lines of a lot, in order.
	pub fn renumeroter_lignes(lot_code: &str, count: usize) -> Vec<String> {
		(0..count)
			.map(|i| Self::generer_code_ligne(i, lot_code))
			.collect()
	}

	/// Recomputes every lot code of a quote depth-first.
	///
	/// Returns `(lot_id, nouveau_code)` pairs covering every lot in the
	/// input. Sibling order follows the stored `ordre` then id.
	pub fn renumeroter_arbre(lots: &[LotDevis]) -> Vec<(i64, String)> {
		let mut enfants: HashMap<Option<i64>, Vec<&LotDevis>> = HashMap::new();
		for lot in lots {
			enfants.entry(lot.parent_id).or_default().push(lot);
		}
		for freres in enfants.values_mut() {
			freres.sort_by_key(|l| (l.ordre, l.id));
		}

		let mut codes = Vec::with_capacity(lots.len());
		let mut pile: Vec<(i64, String)> = Vec::new();
		if let Some(racines) = enfants.get(&None) {
			// Push in reverse so the traversal pops siblings in order
			for (ordre, lot) in racines.iter().enumerate().rev() {
				let code = Self::generer_code_lot(ordre, None);
				pile.push((lot.id.unwrap_or_default(), code));
			}
		}
		while let Some((lot_id, code)) = pile.pop() {
			codes.push((lot_id, code.clone()));
			if let Some(fils) = enfants.get(&Some(lot_id)) {
				for (ordre, lot) in fils.iter().enumerate().rev() {
					let code_fils = Self::generer_code_lot(ordre, Some(&code));
					pile.push((lot.id.unwrap_or_default(), code_fils));
				}
			}
		}
		codes
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_codes_lots() {
		assert_eq!(NumerotationService::generer_code_lot(0, None), "1");
		assert_eq!(NumerotationService::generer_code_lot(2, Some("1")), "1.3");
		assert_eq!(NumerotationService::generer_code_lot(0, Some("2.1")), "2.1.1");
	}

	#[test]
	fn test_codes_lignes() {
		assert_eq!(NumerotationService::generer_code_ligne(0, "1"), "1.01");
		assert_eq!(NumerotationService::generer_code_ligne(4, "2.1"), "2.1.05");
		assert_eq!(
			NumerotationService::renumeroter_lignes("1.1", 3),
			vec!["1.1.01", "1.1.02", "1.1.03"]
		);
	}

	fn lot(id: i64, parent: Option<i64>, ordre: i32) -> LotDevis {
		let mut l = LotDevis::new(1, "x", "Lot", ordre).unwrap();
		l.id = Some(id);
		l.parent_id = parent;
		l
	}

	#[test]
	fn test_renumerotation_arbre() {
		// One root lot with two children
		let lots = vec![lot(10, None, 0), lot(11, Some(10), 0), lot(12, Some(10), 1)];
		let codes = NumerotationService::renumeroter_arbre(&lots);
		assert_eq!(
			codes,
			vec![
				(10, "1".to_string()),
				(11, "1.1".to_string()),
				(12, "1.2".to_string()),
			]
		);
	}

	#[test]
	fn test_scenario_numerotation_complet() {
		// Structure from the numbering scenario: lot 1 with children 1.1
		// and 1.2, each carrying three lines
		let lots = vec![lot(1, None, 0), lot(2, Some(1), 0), lot(3, Some(1), 1)];
		let codes = NumerotationService::renumeroter_arbre(&lots);
		let codes_map: HashMap<i64, String> = codes.into_iter().collect();
		assert_eq!(codes_map[&1], "1");
		assert_eq!(codes_map[&2], "1.1");
		assert_eq!(codes_map[&3], "1.2");

		let mut attendus = vec!["1.1.01", "1.1.02", "1.1.03"];
		assert_eq!(
			NumerotationService::renumeroter_lignes(&codes_map[&2], 3),
			attendus
		);
		attendus = vec!["1.2.01", "1.2.02", "1.2.03"];
		assert_eq!(
			NumerotationService::renumeroter_lignes(&codes_map[&3], 3),
			attendus
		);
	}
}
