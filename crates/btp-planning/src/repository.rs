//! Need repository trait and in-memory implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::besoin::BesoinCharge;
use crate::error::PlanningError;
use crate::semaine::Semaine;
use crate::type_metier::TypeMetier;

/// Persistence contract of the weekly needs.
#[async_trait]
pub trait BesoinChargeRepository: Send + Sync {
	/// Creates or updates a need.
	async fn save(&self, besoin: BesoinCharge) -> Result<BesoinCharge, PlanningError>;

	async fn find_by_id(&self, id: i64) -> Result<Option<BesoinCharge>, PlanningError>;

	/// Needs of one work-site inside an inclusive week range.
	async fn find_by_chantier(
		&self,
		chantier_id: i64,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<BesoinCharge>, PlanningError>;

	/// Every need inside an inclusive week range.
	async fn find_all_in_range(
		&self,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<BesoinCharge>, PlanningError>;

	/// True when a need already exists for the triplet, excluding an
	/// optional id (used by updates).
	async fn exists(
		&self,
		chantier_id: i64,
		semaine: Semaine,
		type_metier: TypeMetier,
		exclude_id: Option<i64>,
	) -> Result<bool, PlanningError>;

	async fn delete(&self, id: i64) -> Result<bool, PlanningError>;

	/// Drops every need of a closed work-site; returns the count.
	async fn delete_by_chantier(&self, chantier_id: i64) -> Result<usize, PlanningError>;

	/// Total hours needed for one week.
	async fn sum_besoins_by_semaine(&self, semaine: Semaine) -> Result<f64, PlanningError>;

	/// Work-site ids carrying needs inside a range.
	async fn chantiers_avec_besoins(
		&self,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<i64>, PlanningError>;
}

/// In-memory need store.
#[derive(Default)]
pub struct MemoryBesoinChargeRepository {
	rows: RwLock<HashMap<i64, BesoinCharge>>,
	next_id: AtomicI64,
}

impl MemoryBesoinChargeRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl BesoinChargeRepository for MemoryBesoinChargeRepository {
	async fn save(&self, mut besoin: BesoinCharge) -> Result<BesoinCharge, PlanningError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match besoin.id {
			None => {
				besoin.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
				besoin.created_at.get_or_insert(now);
				besoin.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(PlanningError::BesoinNotFound { besoin_id: id });
				}
				besoin.updated_at = Some(now);
			}
		}
		rows.insert(besoin.id.unwrap(), besoin.clone());
		Ok(besoin)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<BesoinCharge>, PlanningError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).cloned())
	}

	async fn find_by_chantier(
		&self,
		chantier_id: i64,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<BesoinCharge>, PlanningError> {
		let rows = self.rows.read().await;
		let mut besoins: Vec<BesoinCharge> = rows
			.values()
			.filter(|b| b.chantier_id == chantier_id)
			.filter(|b| b.semaine >= debut && b.semaine <= fin)
			.cloned()
			.collect();
		besoins.sort_by_key(|b| (b.semaine, b.id));
		Ok(besoins)
	}

	async fn find_all_in_range(
		&self,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<BesoinCharge>, PlanningError> {
		let rows = self.rows.read().await;
		let mut besoins: Vec<BesoinCharge> = rows
			.values()
			.filter(|b| b.semaine >= debut && b.semaine <= fin)
			.cloned()
			.collect();
		besoins.sort_by_key(|b| (b.chantier_id, b.semaine, b.id));
		Ok(besoins)
	}

	async fn exists(
		&self,
		chantier_id: i64,
		semaine: Semaine,
		type_metier: TypeMetier,
		exclude_id: Option<i64>,
	) -> Result<bool, PlanningError> {
		let rows = self.rows.read().await;
		Ok(rows.values().any(|b| {
			b.chantier_id == chantier_id
				&& b.semaine == semaine
				&& b.type_metier == type_metier
				&& b.id != exclude_id
		}))
	}

	async fn delete(&self, id: i64) -> Result<bool, PlanningError> {
		let mut rows = self.rows.write().await;
		Ok(rows.remove(&id).is_some())
	}

	async fn delete_by_chantier(&self, chantier_id: i64) -> Result<usize, PlanningError> {
		let mut rows = self.rows.write().await;
		let avant = rows.len();
		rows.retain(|_, b| b.chantier_id != chantier_id);
		Ok(avant - rows.len())
	}

	async fn sum_besoins_by_semaine(&self, semaine: Semaine) -> Result<f64, PlanningError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.filter(|b| b.semaine == semaine)
			.map(|b| b.besoin_heures)
			.sum())
	}

	async fn chantiers_avec_besoins(
		&self,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<i64>, PlanningError> {
		let rows = self.rows.read().await;
		let mut ids: Vec<i64> = rows
			.values()
			.filter(|b| b.semaine >= debut && b.semaine <= fin)
			.map(|b| b.chantier_id)
			.collect();
		ids.sort_unstable();
		ids.dedup();
		Ok(ids)
	}
}
