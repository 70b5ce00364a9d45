//! Tabular aggregation of the workload plan.
//!
//! One row per active work-site, one column per week of the requested
//! range. Each cell carries planned hours, needed hours, the uncovered
//! remainder. The footer derives, per week, the occupancy ratio, the
//! hiring signal (`a_recruter`) and the unassigned-user count
//! (`a_placer`).

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::besoin::HEURES_PAR_JOUR;
use crate::cache::PlanningCache;
use crate::error::PlanningError;
use crate::providers::{AffectationProvider, ChantierInfo, ChantierProvider};
use crate::repository::BesoinChargeRepository;
use crate::semaine::Semaine;
use crate::taux_occupation::TauxOccupation;

/// Weekly working hours (35-hour basis).
pub const HEURES_PAR_SEMAINE: f64 = 35.0;

/// Display unit of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniteCharge {
	Heures,
	JoursHomme,
}

impl UniteCharge {
	/// Converts stored hours into the display unit.
	pub fn convertir(&self, heures: f64) -> f64 {
		match self {
			Self::Heures => heures,
			Self::JoursHomme => heures / HEURES_PAR_JOUR,
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			Self::Heures => "heures",
			Self::JoursHomme => "jours_homme",
		}
	}
}

/// Query of the aggregation.
#[derive(Debug, Clone)]
pub struct PlanningFiltres {
	pub debut: Semaine,
	pub fin: Semaine,
	pub recherche: Option<String>,
	pub unite: UniteCharge,
}

/// One work-site x week cell, in the display unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CellulePlanning {
	pub semaine: Semaine,
	pub planifie: f64,
	pub besoin: f64,
	pub non_couvert: f64,
	pub has_besoin: bool,
}

/// One work-site row.
#[derive(Debug, Clone)]
pub struct ChantierPlanning {
	pub chantier: ChantierInfo,
	pub cellules: Vec<CellulePlanning>,
}

/// Footer indicators of one week.
#[derive(Debug, Clone)]
pub struct FooterSemaine {
	pub semaine: Semaine,
	pub taux_occupation: TauxOccupation,
	/// Staff to hire: the need deficit in 35-hour weeks, floored at 0.
	pub a_recruter: u32,
	/// Users without an assignment that week.
	pub a_placer: u32,
}

/// Full tabular plan.
#[derive(Debug, Clone)]
pub struct PlanningCharge {
	pub semaines: Vec<Semaine>,
	pub unite: UniteCharge,
	pub chantiers: Vec<ChantierPlanning>,
	pub footer: Vec<FooterSemaine>,
	pub capacite_totale: f64,
	pub planifie_total: f64,
	pub besoin_total: f64,
}

/// Builds the tabular workload plan.
pub struct GetPlanningChargeUseCase {
	pub besoin_repo: Arc<dyn BesoinChargeRepository>,
	pub chantier_provider: Arc<dyn ChantierProvider>,
	pub affectation_provider: Arc<dyn AffectationProvider>,
	pub cache: Option<Arc<PlanningCache>>,
}

impl GetPlanningChargeUseCase {
	#[instrument(skip_all, fields(debut = %filtres.debut.code(), fin = %filtres.fin.code()))]
	pub async fn execute(&self, filtres: &PlanningFiltres) -> Result<PlanningCharge, PlanningError> {
		if let Some(cache) = &self.cache {
			if let Some(planning) = cache.lire(filtres) {
				return Ok(planning);
			}
		}

		let semaines = Semaine::plage(filtres.debut, filtres.fin)?;

		let chantiers = self
			.chantier_provider
			.chantiers_actifs(filtres.recherche.as_deref())
			.await?;
		let chantier_ids: Vec<i64> = chantiers.iter().map(|c| c.id).collect();

		// Needs of the whole range in one call, indexed per cell
		let besoins = self
			.besoin_repo
			.find_all_in_range(filtres.debut, filtres.fin)
			.await?;
		let mut besoins_index: HashMap<(i64, Semaine), f64> = HashMap::new();
		for besoin in &besoins {
			*besoins_index
				.entry((besoin.chantier_id, besoin.semaine))
				.or_insert(0.0) += besoin.besoin_heures;
		}

		let planifie_index = self
			.affectation_provider
			.heures_planifiees(&chantier_ids, filtres.debut, filtres.fin)
			.await?;
		let capacites = self
			.affectation_provider
			.capacite_par_semaine(filtres.debut, filtres.fin)
			.await?;
		let non_planifies = self
			.affectation_provider
			.utilisateurs_non_planifies(filtres.debut, filtres.fin)
			.await?;

		let lignes = chantiers
			.into_iter()
			.map(|chantier| {
				let cellules = semaines
					.iter()
					.map(|semaine| {
						let cle = (chantier.id, *semaine);
						let planifie = planifie_index.get(&cle).copied().unwrap_or(0.0);
						let besoin = besoins_index.get(&cle).copied().unwrap_or(0.0);
						let non_couvert = (besoin - planifie).max(0.0);
						CellulePlanning {
							semaine: *semaine,
							planifie: filtres.unite.convertir(planifie),
							besoin: filtres.unite.convertir(besoin),
							non_couvert: filtres.unite.convertir(non_couvert),
							has_besoin: besoin > 0.0,
						}
					})
					.collect();
				ChantierPlanning { chantier, cellules }
			})
			.collect::<Vec<_>>();

		let mut footer = Vec::with_capacity(semaines.len());
		for semaine in &semaines {
			let planifie_semaine: f64 = chantier_ids
				.iter()
				.filter_map(|id| planifie_index.get(&(*id, *semaine)))
				.sum();
			let besoin_semaine: f64 = chantier_ids
				.iter()
				.filter_map(|id| besoins_index.get(&(*id, *semaine)))
				.sum();
			// Degraded mode when the provider has no capacity for the
			// week: assume twenty 35-hour users
			let capacite = capacites
				.get(semaine)
				.copied()
				.unwrap_or(HEURES_PAR_SEMAINE * 20.0);

			let taux = TauxOccupation::calculer(planifie_semaine, capacite);
			let deficit = (besoin_semaine - capacite).max(0.0);
			let a_recruter = (deficit / HEURES_PAR_SEMAINE + 0.5) as u32;
			let a_placer = non_planifies.get(semaine).copied().unwrap_or(0);

			footer.push(FooterSemaine {
				semaine: *semaine,
				taux_occupation: taux,
				a_recruter,
				a_placer,
			});
		}

		let planning = PlanningCharge {
			capacite_totale: capacites.values().sum(),
			planifie_total: planifie_index.values().sum(),
			besoin_total: besoins_index.values().sum(),
			semaines,
			unite: filtres.unite,
			chantiers: lignes,
			footer,
		};

		if let Some(cache) = &self.cache {
			cache.ecrire(filtres, planning.clone());
		}
		Ok(planning)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::besoin::BesoinCharge;
	use crate::repository::MemoryBesoinChargeRepository;
	use crate::type_metier::TypeMetier;
	use async_trait::async_trait;

	fn semaine(code: &str) -> Semaine {
		Semaine::from_code(code).unwrap()
	}

	struct ChantiersFixes(Vec<ChantierInfo>);

	#[async_trait]
	impl ChantierProvider for ChantiersFixes {
		async fn chantiers_actifs(
			&self,
			recherche: Option<&str>,
		) -> Result<Vec<ChantierInfo>, PlanningError> {
			Ok(self
				.0
				.iter()
				.filter(|c| {
					recherche.is_none_or(|r| {
						c.nom.to_lowercase().contains(&r.to_lowercase())
							|| c.code.to_lowercase().contains(&r.to_lowercase())
					})
				})
				.cloned()
				.collect())
		}
	}

	struct AffectationsFixes {
		planifie: HashMap<(i64, Semaine), f64>,
		/// None: the provider knows no capacity for any week.
		capacite: Option<f64>,
		non_planifies: u32,
	}

	#[async_trait]
	impl AffectationProvider for AffectationsFixes {
		async fn heures_planifiees(
			&self,
			_chantier_ids: &[i64],
			_debut: Semaine,
			_fin: Semaine,
		) -> Result<HashMap<(i64, Semaine), f64>, PlanningError> {
			Ok(self.planifie.clone())
		}

		async fn capacite_par_semaine(
			&self,
			debut: Semaine,
			fin: Semaine,
		) -> Result<HashMap<Semaine, f64>, PlanningError> {
			let Some(capacite) = self.capacite else {
				return Ok(HashMap::new());
			};
			Ok(Semaine::plage(debut, fin)?
				.into_iter()
				.map(|s| (s, capacite))
				.collect())
		}

		async fn utilisateurs_non_planifies(
			&self,
			debut: Semaine,
			fin: Semaine,
		) -> Result<HashMap<Semaine, u32>, PlanningError> {
			Ok(Semaine::plage(debut, fin)?
				.into_iter()
				.map(|s| (s, self.non_planifies))
				.collect())
		}
	}

	fn chantier(id: i64, nom: &str) -> ChantierInfo {
		ChantierInfo {
			id,
			code: format!("C{:03}", id),
			nom: nom.into(),
			couleur: "#3498DB".into(),
			heures_estimees: 0.0,
		}
	}

	async fn fixture(
		capacite: Option<f64>,
		planifie: HashMap<(i64, Semaine), f64>,
	) -> GetPlanningChargeUseCase {
		let repo = Arc::new(MemoryBesoinChargeRepository::new());
		repo.save(
			BesoinCharge::new(1, semaine("S10-2026"), TypeMetier::Macon, 70.0, 1).unwrap(),
		)
		.await
		.unwrap();
		GetPlanningChargeUseCase {
			besoin_repo: repo,
			chantier_provider: Arc::new(ChantiersFixes(vec![
				chantier(1, "Residence Les Pins"),
				chantier(2, "Ecole Jean Moulin"),
			])),
			affectation_provider: Arc::new(AffectationsFixes {
				planifie,
				capacite,
				non_planifies: 2,
			}),
			cache: None,
		}
	}

	fn filtres(debut: &str, fin: &str) -> PlanningFiltres {
		PlanningFiltres {
			debut: semaine(debut),
			fin: semaine(fin),
			recherche: None,
			unite: UniteCharge::Heures,
		}
	}

	#[tokio::test]
	async fn test_cellules_et_non_couvert() {
		let mut planifie = HashMap::new();
		planifie.insert((1, semaine("S10-2026")), 42.0);
		let uc = fixture(Some(420.0), planifie).await;

		let planning = uc
			.execute(&filtres("S10-2026", "S11-2026"))
			.await
			.unwrap();
		assert_eq!(planning.semaines.len(), 2);
		assert_eq!(planning.chantiers.len(), 2);

		let cellule = &planning.chantiers[0].cellules[0];
		assert_eq!(cellule.planifie, 42.0);
		assert_eq!(cellule.besoin, 70.0);
		assert_eq!(cellule.non_couvert, 28.0);
		assert!(cellule.has_besoin);

		// The second site has no need that week
		let vide = &planning.chantiers[1].cellules[0];
		assert_eq!(vide.besoin, 0.0);
		assert!(!vide.has_besoin);
	}

	#[tokio::test]
	async fn test_footer_occupation_et_signaux() {
		let mut planifie = HashMap::new();
		planifie.insert((1, semaine("S10-2026")), 420.0);
		let uc = fixture(Some(420.0), planifie).await;

		let planning = uc
			.execute(&filtres("S10-2026", "S10-2026"))
			.await
			.unwrap();
		let footer = &planning.footer[0];
		// 420/420: optimal, no alert
		assert_eq!(footer.taux_occupation.valeur, 1.0);
		assert!(!footer.taux_occupation.alerte());
		// Need 70 under capacity 420: nobody to hire
		assert_eq!(footer.a_recruter, 0);
		assert_eq!(footer.a_placer, 2);
	}

	#[tokio::test]
	async fn test_a_recruter_arrondi() {
		// Capacity 35, need 70: deficit 35 -> one 35-hour week to hire
		let uc = fixture(Some(35.0), HashMap::new()).await;
		let planning = uc
			.execute(&filtres("S10-2026", "S10-2026"))
			.await
			.unwrap();
		assert_eq!(planning.footer[0].a_recruter, 1);
	}

	#[tokio::test]
	async fn test_capacite_absente_mode_degrade() {
		// No capacity from the provider: the footer assumes twenty
		// 35-hour users (700 h)
		let mut planifie = HashMap::new();
		planifie.insert((1, semaine("S10-2026")), 350.0);
		let uc = fixture(None, planifie).await;
		let planning = uc
			.execute(&filtres("S10-2026", "S10-2026"))
			.await
			.unwrap();
		let footer = &planning.footer[0];
		assert_eq!(footer.taux_occupation.valeur, 0.5);
		// Need 70 stays far under the assumed capacity
		assert_eq!(footer.a_recruter, 0);
	}

	#[tokio::test]
	async fn test_conversion_jours_homme() {
		let mut planifie = HashMap::new();
		planifie.insert((1, semaine("S10-2026")), 35.0);
		let uc = fixture(Some(420.0), planifie).await;

		let planning = uc
			.execute(&PlanningFiltres {
				debut: semaine("S10-2026"),
				fin: semaine("S10-2026"),
				recherche: None,
				unite: UniteCharge::JoursHomme,
			})
			.await
			.unwrap();
		let cellule = &planning.chantiers[0].cellules[0];
		assert_eq!(cellule.planifie, 5.0);
		assert_eq!(cellule.besoin, 10.0);
		// Stored totals stay in hours
		assert_eq!(planning.besoin_total, 70.0);
	}

	#[tokio::test]
	async fn test_recherche_filtre_les_chantiers() {
		let uc = fixture(Some(420.0), HashMap::new()).await;
		let planning = uc
			.execute(&PlanningFiltres {
				debut: semaine("S10-2026"),
				fin: semaine("S10-2026"),
				recherche: Some("ecole".into()),
				unite: UniteCharge::Heures,
			})
			.await
			.unwrap();
		assert_eq!(planning.chantiers.len(), 1);
		assert_eq!(planning.chantiers[0].chantier.nom, "Ecole Jean Moulin");
	}

	#[tokio::test]
	async fn test_plage_invalide() {
		let uc = fixture(Some(420.0), HashMap::new()).await;
		let err = uc
			.execute(&filtres("S11-2026", "S10-2026"))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "invalid_semaine_range");
	}
}
