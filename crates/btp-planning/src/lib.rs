//! Workload planner of the BTP back-office core.
//!
//! A parallel sub-core reading from the chantier, affectation and user
//! providers, aggregating weekly manpower needs per work-site, and
//! deriving occupancy ratings, shortfall detection and staffing
//! signals. Planning reads are read-only; the aggregation is memoized
//! and invalidated on every need write.

/// Weekly need entity.
pub mod besoin;
/// Memoization of the aggregation.
pub mod cache;
/// Error taxonomy of the planner.
pub mod error;
/// Tabular aggregation use case.
pub mod planning;
/// Provider ports to the other modules.
pub mod providers;
/// Need repository trait and in-memory implementation.
pub mod repository;
/// Week key value object.
pub mod semaine;
/// Occupancy ratio value object.
pub mod taux_occupation;
/// Craft type value object.
pub mod type_metier;
/// Need CRUD use cases.
pub mod usecases;

pub use besoin::BesoinCharge;
pub use cache::PlanningCache;
pub use error::PlanningError;
pub use planning::{
	CellulePlanning, ChantierPlanning, FooterSemaine, GetPlanningChargeUseCase,
	PlanningCharge, PlanningFiltres, UniteCharge,
};
pub use providers::{AffectationProvider, ChantierInfo, ChantierProvider, UtilisateurProvider};
pub use repository::{BesoinChargeRepository, MemoryBesoinChargeRepository};
pub use semaine::Semaine;
pub use taux_occupation::{NiveauOccupation, TauxOccupation};
pub use type_metier::TypeMetier;
