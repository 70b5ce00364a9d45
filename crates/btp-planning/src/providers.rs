//! Provider ports to the chantier, affectation and user modules.
//!
//! The planner never reaches into the other modules' storage: it reads
//! through these traits, implemented on the infrastructure side.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::PlanningError;
use crate::semaine::Semaine;
use crate::type_metier::TypeMetier;

/// Work-site summary used by the tabular view.
#[derive(Debug, Clone)]
pub struct ChantierInfo {
	pub id: i64,
	pub code: String,
	pub nom: String,
	pub couleur: String,
	pub heures_estimees: f64,
}

/// Read access to active work-sites.
#[async_trait]
pub trait ChantierProvider: Send + Sync {
	/// Active work-sites, optionally filtered by a substring on name or
	/// code.
	async fn chantiers_actifs(
		&self,
		recherche: Option<&str>,
	) -> Result<Vec<ChantierInfo>, PlanningError>;
}

/// Read access to planned hours and weekly capacity.
#[async_trait]
pub trait AffectationProvider: Send + Sync {
	/// Planned hours per (work-site, week) over a range.
	async fn heures_planifiees(
		&self,
		chantier_ids: &[i64],
		debut: Semaine,
		fin: Semaine,
	) -> Result<HashMap<(i64, Semaine), f64>, PlanningError>;

	/// Capacity per week (active users x weekly hours).
	async fn capacite_par_semaine(
		&self,
		debut: Semaine,
		fin: Semaine,
	) -> Result<HashMap<Semaine, f64>, PlanningError>;

	/// Count of users without any assignment, per week.
	async fn utilisateurs_non_planifies(
		&self,
		debut: Semaine,
		fin: Semaine,
	) -> Result<HashMap<Semaine, u32>, PlanningError>;
}

/// Read access to the user directory.
#[async_trait]
pub trait UtilisateurProvider: Send + Sync {
	/// Capacity in hours per craft for one week.
	async fn capacite_par_type_metier(
		&self,
		semaine: Semaine,
	) -> Result<HashMap<TypeMetier, f64>, PlanningError>;

	/// Total count of active users.
	async fn total_utilisateurs_actifs(&self) -> Result<u32, PlanningError>;
}
