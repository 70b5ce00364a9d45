//! Need CRUD use cases.
//!
//! Creation and update enforce the uniqueness of the (work-site, week,
//! craft) triplet; writes are role-gated (admin and conducteur) and
//! invalidate the aggregation cache.

use std::sync::Arc;
use tracing::instrument;

use crate::besoin::BesoinCharge;
use crate::cache::PlanningCache;
use crate::error::PlanningError;
use crate::repository::BesoinChargeRepository;
use crate::semaine::Semaine;
use crate::type_metier::TypeMetier;

const ROLES_ECRITURE: [&str; 2] = ["admin", "conducteur"];

fn verifier_role(role: &str, action: &str) -> Result<(), PlanningError> {
	if !ROLES_ECRITURE.contains(&role) {
		return Err(PlanningError::NonAutorise {
			role: role.to_string(),
			action: action.to_string(),
		});
	}
	Ok(())
}

/// Input of need creation.
#[derive(Debug, Clone)]
pub struct BesoinInput {
	pub chantier_id: i64,
	pub semaine: Semaine,
	pub type_metier: TypeMetier,
	pub besoin_heures: f64,
	pub note: Option<String>,
}

/// Creates a weekly need.
pub struct CreateBesoinUseCase {
	pub besoin_repo: Arc<dyn BesoinChargeRepository>,
	pub cache: Option<Arc<PlanningCache>>,
}

impl CreateBesoinUseCase {
	#[instrument(skip_all, fields(chantier_id = input.chantier_id))]
	pub async fn execute(
		&self,
		input: BesoinInput,
		role: &str,
		created_by: i64,
	) -> Result<BesoinCharge, PlanningError> {
		verifier_role(role, "creer_besoin")?;

		if self
			.besoin_repo
			.exists(input.chantier_id, input.semaine, input.type_metier, None)
			.await?
		{
			return Err(PlanningError::BesoinAlreadyExists {
				chantier_id: input.chantier_id,
				semaine: input.semaine.code(),
				metier: input.type_metier.code().to_string(),
			});
		}

		let mut besoin = BesoinCharge::new(
			input.chantier_id,
			input.semaine,
			input.type_metier,
			input.besoin_heures,
			created_by,
		)?;
		besoin.modifier_note(input.note);
		let besoin = self.besoin_repo.save(besoin).await?;

		if let Some(cache) = &self.cache {
			cache.invalider();
		}
		Ok(besoin)
	}
}

/// Editable fields of a need update.
#[derive(Debug, Clone, Default)]
pub struct BesoinUpdate {
	pub besoin_heures: Option<f64>,
	pub type_metier: Option<TypeMetier>,
	pub note: Option<Option<String>>,
}

/// Updates a weekly need.
pub struct UpdateBesoinUseCase {
	pub besoin_repo: Arc<dyn BesoinChargeRepository>,
	pub cache: Option<Arc<PlanningCache>>,
}

impl UpdateBesoinUseCase {
	#[instrument(skip_all, fields(besoin_id))]
	pub async fn execute(
		&self,
		besoin_id: i64,
		update: BesoinUpdate,
		role: &str,
	) -> Result<BesoinCharge, PlanningError> {
		verifier_role(role, "modifier_besoin")?;

		let mut besoin = self
			.besoin_repo
			.find_by_id(besoin_id)
			.await?
			.ok_or(PlanningError::BesoinNotFound { besoin_id })?;

		if let Some(nouveau_type) = update.type_metier {
			// The new triplet must stay unique
			if self
				.besoin_repo
				.exists(besoin.chantier_id, besoin.semaine, nouveau_type, besoin.id)
				.await?
			{
				return Err(PlanningError::BesoinAlreadyExists {
					chantier_id: besoin.chantier_id,
					semaine: besoin.semaine.code(),
					metier: nouveau_type.code().to_string(),
				});
			}
			besoin.changer_type_metier(nouveau_type);
		}
		if let Some(heures) = update.besoin_heures {
			besoin.modifier_besoin(heures)?;
		}
		if let Some(note) = update.note {
			besoin.modifier_note(note);
		}
		let besoin = self.besoin_repo.save(besoin).await?;

		if let Some(cache) = &self.cache {
			cache.invalider();
		}
		Ok(besoin)
	}
}

/// Deletes a weekly need.
pub struct DeleteBesoinUseCase {
	pub besoin_repo: Arc<dyn BesoinChargeRepository>,
	pub cache: Option<Arc<PlanningCache>>,
}

impl DeleteBesoinUseCase {
	#[instrument(skip_all, fields(besoin_id))]
	pub async fn execute(&self, besoin_id: i64, role: &str) -> Result<(), PlanningError> {
		verifier_role(role, "supprimer_besoin")?;
		if !self.besoin_repo.delete(besoin_id).await? {
			return Err(PlanningError::BesoinNotFound { besoin_id });
		}
		if let Some(cache) = &self.cache {
			cache.invalider();
		}
		Ok(())
	}
}

/// Lists the needs of one work-site over a week range.
pub struct GetBesoinsByChantierUseCase {
	pub besoin_repo: Arc<dyn BesoinChargeRepository>,
}

impl GetBesoinsByChantierUseCase {
	pub async fn execute(
		&self,
		chantier_id: i64,
		debut: Semaine,
		fin: Semaine,
	) -> Result<Vec<BesoinCharge>, PlanningError> {
		if debut > fin {
			return Err(PlanningError::InvalidSemaineRange(format!(
				"{} > {}",
				debut.code(),
				fin.code()
			)));
		}
		self.besoin_repo
			.find_by_chantier(chantier_id, debut, fin)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::repository::MemoryBesoinChargeRepository;

	fn semaine(code: &str) -> Semaine {
		Semaine::from_code(code).unwrap()
	}

	fn input() -> BesoinInput {
		BesoinInput {
			chantier_id: 1,
			semaine: semaine("S10-2026"),
			type_metier: TypeMetier::Macon,
			besoin_heures: 35.0,
			note: None,
		}
	}

	fn fixture() -> (Arc<MemoryBesoinChargeRepository>, Arc<PlanningCache>) {
		(
			Arc::new(MemoryBesoinChargeRepository::new()),
			Arc::new(PlanningCache::new()),
		)
	}

	#[tokio::test]
	async fn test_unicite_du_triplet() {
		let (repo, cache) = fixture();
		let uc = CreateBesoinUseCase {
			besoin_repo: repo.clone(),
			cache: Some(cache),
		};
		uc.execute(input(), "conducteur", 1).await.unwrap();
		let err = uc.execute(input(), "conducteur", 1).await.unwrap_err();
		assert_eq!(err.kind(), "besoin_already_exists");

		// Another craft on the same site and week is fine
		let mut autre = input();
		autre.type_metier = TypeMetier::Coffreur;
		uc.execute(autre, "conducteur", 1).await.unwrap();
	}

	#[tokio::test]
	async fn test_role_lecture_refuse() {
		let (repo, cache) = fixture();
		let uc = CreateBesoinUseCase {
			besoin_repo: repo,
			cache: Some(cache),
		};
		for role in ["commercial", "chef_chantier", "compagnon"] {
			let err = uc.execute(input(), role, 1).await.unwrap_err();
			assert_eq!(err.kind(), "transition_non_autorisee");
		}
	}

	#[tokio::test]
	async fn test_update_verifie_unicite() {
		let (repo, cache) = fixture();
		let create = CreateBesoinUseCase {
			besoin_repo: repo.clone(),
			cache: Some(cache.clone()),
		};
		create.execute(input(), "admin", 1).await.unwrap();
		let mut autre = input();
		autre.type_metier = TypeMetier::Coffreur;
		let coffreur = create.execute(autre, "admin", 1).await.unwrap();

		let update = UpdateBesoinUseCase {
			besoin_repo: repo,
			cache: Some(cache),
		};
		// Renaming the coffreur need to macon collides
		let err = update
			.execute(
				coffreur.id.unwrap(),
				BesoinUpdate {
					type_metier: Some(TypeMetier::Macon),
					..Default::default()
				},
				"admin",
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "besoin_already_exists");

		// Changing hours on itself is fine
		let modifie = update
			.execute(
				coffreur.id.unwrap(),
				BesoinUpdate {
					besoin_heures: Some(14.0),
					..Default::default()
				},
				"admin",
			)
			.await
			.unwrap();
		assert_eq!(modifie.besoin_heures, 14.0);
	}

	#[tokio::test]
	async fn test_ecriture_invalide_le_cache() {
		use crate::planning::{PlanningCharge, PlanningFiltres, UniteCharge};
		let (repo, cache) = fixture();
		cache.ecrire(
			&PlanningFiltres {
				debut: semaine("S10-2026"),
				fin: semaine("S12-2026"),
				recherche: None,
				unite: UniteCharge::Heures,
			},
			PlanningCharge {
				semaines: vec![],
				unite: UniteCharge::Heures,
				chantiers: vec![],
				footer: vec![],
				capacite_totale: 0.0,
				planifie_total: 0.0,
				besoin_total: 0.0,
			},
		);
		assert_eq!(cache.len(), 1);

		CreateBesoinUseCase {
			besoin_repo: repo,
			cache: Some(cache.clone()),
		}
		.execute(input(), "admin", 1)
		.await
		.unwrap();
		assert!(cache.is_empty());
	}

	#[tokio::test]
	async fn test_suppression() {
		let (repo, cache) = fixture();
		let besoin = CreateBesoinUseCase {
			besoin_repo: repo.clone(),
			cache: Some(cache.clone()),
		}
		.execute(input(), "admin", 1)
		.await
		.unwrap();

		let delete = DeleteBesoinUseCase {
			besoin_repo: repo,
			cache: Some(cache),
		};
		delete.execute(besoin.id.unwrap(), "admin").await.unwrap();
		let err = delete.execute(besoin.id.unwrap(), "admin").await.unwrap_err();
		assert_eq!(err.kind(), "besoin_not_found");
	}
}
