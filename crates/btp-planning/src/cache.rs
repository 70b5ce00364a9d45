//! Memoization of the workload aggregation.
//!
//! Planning reads are heavy and read-mostly; results are keyed by the
//! full filter set and every need write invalidates the whole cache.

use dashmap::DashMap;

use crate::planning::{PlanningCharge, PlanningFiltres};

/// Keyed memo of aggregation results.
#[derive(Default)]
pub struct PlanningCache {
	entrees: DashMap<String, PlanningCharge>,
}

fn cle(filtres: &PlanningFiltres) -> String {
	format!(
		"{}|{}|{}|{}",
		filtres.debut.code(),
		filtres.fin.code(),
		filtres.recherche.as_deref().unwrap_or(""),
		filtres.unite.code(),
	)
}

impl PlanningCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lire(&self, filtres: &PlanningFiltres) -> Option<PlanningCharge> {
		self.entrees.get(&cle(filtres)).map(|e| e.value().clone())
	}

	pub fn ecrire(&self, filtres: &PlanningFiltres, planning: PlanningCharge) {
		self.entrees.insert(cle(filtres), planning);
	}

	/// Drops every memoized result. Called on every need write.
	pub fn invalider(&self) {
		self.entrees.clear();
	}

	pub fn len(&self) -> usize {
		self.entrees.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entrees.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::planning::UniteCharge;
	use crate::semaine::Semaine;

	fn filtres() -> PlanningFiltres {
		PlanningFiltres {
			debut: Semaine::from_code("S10-2026").unwrap(),
			fin: Semaine::from_code("S12-2026").unwrap(),
			recherche: None,
			unite: UniteCharge::Heures,
		}
	}

	fn planning() -> PlanningCharge {
		PlanningCharge {
			semaines: vec![],
			unite: UniteCharge::Heures,
			chantiers: vec![],
			footer: vec![],
			capacite_totale: 0.0,
			planifie_total: 0.0,
			besoin_total: 0.0,
		}
	}

	#[test]
	fn test_lecture_apres_ecriture() {
		let cache = PlanningCache::new();
		assert!(cache.lire(&filtres()).is_none());
		cache.ecrire(&filtres(), planning());
		assert!(cache.lire(&filtres()).is_some());

		// A different unit is a different key
		let mut autres = filtres();
		autres.unite = UniteCharge::JoursHomme;
		assert!(cache.lire(&autres).is_none());
	}

	#[test]
	fn test_invalidation() {
		let cache = PlanningCache::new();
		cache.ecrire(&filtres(), planning());
		cache.invalider();
		assert!(cache.is_empty());
	}
}
