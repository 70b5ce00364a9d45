//! Weekly manpower need entity.
//!
//! A need links one work-site, one week and one craft to a number of
//! hours; the triplet is unique. The man-day view divides by the 7-hour
//! working day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlanningError;
use crate::semaine::Semaine;
use crate::type_metier::TypeMetier;

/// Hours per working day used for the man-day conversion.
pub const HEURES_PAR_JOUR: f64 = 7.0;

/// A weekly manpower need of a work-site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BesoinCharge {
	pub id: Option<i64>,
	pub chantier_id: i64,
	pub semaine: Semaine,
	pub type_metier: TypeMetier,
	pub besoin_heures: f64,
	pub note: Option<String>,
	pub created_by: i64,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
}

impl BesoinCharge {
	pub fn new(
		chantier_id: i64,
		semaine: Semaine,
		type_metier: TypeMetier,
		besoin_heures: f64,
		created_by: i64,
	) -> Result<Self, PlanningError> {
		if chantier_id <= 0 {
			return Err(PlanningError::Validation(
				"L'ID du chantier doit etre positif".into(),
			));
		}
		if created_by <= 0 {
			return Err(PlanningError::Validation(
				"L'ID du createur doit etre positif".into(),
			));
		}
		if besoin_heures < 0.0 {
			return Err(PlanningError::Validation(
				"Le besoin en heures doit etre >= 0".into(),
			));
		}
		Ok(Self {
			id: None,
			chantier_id,
			semaine,
			type_metier,
			besoin_heures,
			note: None,
			created_by,
			created_at: None,
			updated_at: None,
		})
	}

	/// Need expressed in man-days (7 h per day).
	pub fn besoin_jours_homme(&self) -> f64 {
		if self.besoin_heures > 0.0 {
			self.besoin_heures / HEURES_PAR_JOUR
		} else {
			0.0
		}
	}

	/// `<chantier>-<semaine>-<metier>` key.
	pub fn code_unique(&self) -> String {
		format!(
			"{}-{}-{}",
			self.chantier_id,
			self.semaine.code(),
			self.type_metier.code()
		)
	}

	pub fn modifier_besoin(&mut self, nouvelles_heures: f64) -> Result<(), PlanningError> {
		if nouvelles_heures < 0.0 {
			return Err(PlanningError::Validation(
				"Le besoin en heures doit etre >= 0".into(),
			));
		}
		self.besoin_heures = nouvelles_heures;
		self.updated_at = Some(Utc::now());
		Ok(())
	}

	/// Sets or clears the note; blank notes collapse to None.
	pub fn modifier_note(&mut self, note: Option<String>) {
		self.note = note.and_then(|n| {
			let nettoyee = n.trim().to_string();
			(!nettoyee.is_empty()).then_some(nettoyee)
		});
		self.updated_at = Some(Utc::now());
	}

	pub fn changer_type_metier(&mut self, nouveau_type: TypeMetier) {
		self.type_metier = nouveau_type;
		self.updated_at = Some(Utc::now());
	}
}
