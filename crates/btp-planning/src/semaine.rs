//! Week key value object.
//!
//! Weeks are identified by ISO year and ISO week number, rendered as
//! `SWW-YYYY` (zero-padded week 1..53). A week orders chronologically,
//! steps to the next one and maps to its [monday, sunday] date range.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PlanningError;

/// An ISO week of a given ISO year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Semaine {
	/// ISO year (ordering relies on the field order).
	pub annee: i32,
	/// ISO week number, 1..=53.
	pub numero: u32,
}

impl Semaine {
	/// Builds a week, checking that the ISO year actually carries the
	/// week number (some years have no week 53).
	pub fn new(annee: i32, numero: u32) -> Result<Self, PlanningError> {
		if !(1..=53).contains(&numero) {
			return Err(PlanningError::SemaineInvalide(format!(
				"numero de semaine {} hors de 1..53",
				numero
			)));
		}
		if NaiveDate::from_isoywd_opt(annee, numero, Weekday::Mon).is_none() {
			return Err(PlanningError::SemaineInvalide(format!(
				"l'annee {} ne comporte pas de semaine {}",
				annee, numero
			)));
		}
		Ok(Self { annee, numero })
	}

	/// Week containing a calendar date.
	pub fn from_date(date: NaiveDate) -> Self {
		let iso = date.iso_week();
		Self {
			annee: iso.year(),
			numero: iso.week(),
		}
	}

	/// Parses the `SWW-YYYY` form, e.g. `S07-2026`.
	pub fn from_code(code: &str) -> Result<Self, PlanningError> {
		let invalide = || PlanningError::SemaineInvalide(code.to_string());
		let reste = code.strip_prefix('S').ok_or_else(invalide)?;
		let (semaine, annee) = reste.split_once('-').ok_or_else(invalide)?;
		if semaine.len() != 2 || annee.len() != 4 {
			return Err(invalide());
		}
		let numero: u32 = semaine.parse().map_err(|_| invalide())?;
		let annee: i32 = annee.parse().map_err(|_| invalide())?;
		Self::new(annee, numero)
	}

	/// The `SWW-YYYY` code.
	pub fn code(&self) -> String {
		format!("S{:02}-{}", self.numero, self.annee)
	}

	/// Monday of the week.
	pub fn lundi(&self) -> NaiveDate {
		NaiveDate::from_isoywd_opt(self.annee, self.numero, Weekday::Mon)
			.expect("semaine validee a la construction")
	}

	/// Sunday of the week.
	pub fn dimanche(&self) -> NaiveDate {
		self.lundi() + Duration::days(6)
	}

	/// `[monday, sunday]` range.
	pub fn dates_debut_fin(&self) -> (NaiveDate, NaiveDate) {
		(self.lundi(), self.dimanche())
	}

	/// The following week.
	pub fn next(&self) -> Self {
		Self::from_date(self.lundi() + Duration::days(7))
	}

	/// Inclusive sequence from `debut` to `fin`.
	pub fn plage(debut: Semaine, fin: Semaine) -> Result<Vec<Semaine>, PlanningError> {
		if debut > fin {
			return Err(PlanningError::InvalidSemaineRange(format!(
				"{} > {}",
				debut.code(),
				fin.code()
			)));
		}
		let mut semaines = Vec::new();
		let mut courante = debut;
		while courante <= fin {
			semaines.push(courante);
			courante = courante.next();
		}
		Ok(semaines)
	}
}

impl fmt::Display for Semaine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Semaine {} ({})", self.numero, self.annee)
	}
}
