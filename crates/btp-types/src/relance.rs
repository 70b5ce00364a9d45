//! Follow-up (relance) entity and configuration.
//!
//! A relance is a scheduled notification (email/push) sent to the client
//! when a quote stays unanswered. Each quote carries its own relance
//! configuration: ordered day offsets after the send date, an active
//! flag, and a default notification kind.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DevisError;

/// Notification channel of a relance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRelance {
	Email,
	Push,
	EmailPush,
}

impl TypeRelance {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Email => "Email",
			Self::Push => "Push",
			Self::EmailPush => "Email + Push",
		}
	}
}

/// Lifecycle status of a relance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatutRelance {
	Planifiee,
	Envoyee,
	Annulee,
}

/// Per-quote relance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRelances {
	/// Day offsets after the quote send date, strictly increasing.
	delais: Vec<u32>,
	actif: bool,
	type_relance_defaut: TypeRelance,
}

impl ConfigRelances {
	pub fn new(
		delais: Vec<u32>,
		actif: bool,
		type_relance_defaut: TypeRelance,
	) -> Result<Self, DevisError> {
		if delais.is_empty() {
			return Err(DevisError::ConfigRelancesInvalide(
				"Au moins un delai de relance est requis".into(),
			));
		}
		if delais.iter().any(|d| *d < 1) {
			return Err(DevisError::ConfigRelancesInvalide(
				"Chaque delai doit etre un entier >= 1 jour".into(),
			));
		}
		if delais.windows(2).any(|w| w[0] >= w[1]) {
			return Err(DevisError::ConfigRelancesInvalide(
				"Les delais doivent etre en ordre croissant".into(),
			));
		}
		Ok(Self {
			delais,
			actif,
			type_relance_defaut,
		})
	}

	/// Default configuration: 7, 15 and 30 days by email.
	pub fn defaut() -> Self {
		Self {
			delais: vec![7, 15, 30],
			actif: true,
			type_relance_defaut: TypeRelance::Email,
		}
	}

	pub fn delais(&self) -> &[u32] {
		&self.delais
	}

	pub fn actif(&self) -> bool {
		self.actif
	}

	pub fn type_relance_defaut(&self) -> TypeRelance {
		self.type_relance_defaut
	}

	pub fn nombre_relances(&self) -> usize {
		self.delais.len()
	}

	/// Date of the next relance given how many were already consumed,
	/// or None when exhausted or inactive.
	pub fn prochaine_relance(
		&self,
		date_envoi: DateTime<Utc>,
		nb_relances_effectuees: usize,
	) -> Option<DateTime<Utc>> {
		if !self.actif {
			return None;
		}
		self.delais
			.get(nb_relances_effectuees)
			.map(|delai| date_envoi + Duration::days(i64::from(*delai)))
	}

	/// All planned relance dates for a send date.
	pub fn toutes_les_dates(&self, date_envoi: DateTime<Utc>) -> Vec<DateTime<Utc>> {
		if !self.actif {
			return Vec::new();
		}
		self.delais
			.iter()
			.map(|delai| date_envoi + Duration::days(i64::from(*delai)))
			.collect()
	}
}

impl Default for ConfigRelances {
	fn default() -> Self {
		Self::defaut()
	}
}

/// A planned follow-up for a sent quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelanceDevis {
	pub id: Option<i64>,
	pub devis_id: i64,
	/// Sequence number (1, 2, 3...).
	pub numero_relance: u32,
	pub type_relance: TypeRelance,
	pub date_prevue: DateTime<Utc>,
	pub date_envoi: Option<DateTime<Utc>>,
	pub statut: StatutRelance,
	pub message_personnalise: Option<String>,
	pub created_at: Option<DateTime<Utc>>,
}

impl RelanceDevis {
	pub fn new(
		devis_id: i64,
		numero_relance: u32,
		type_relance: TypeRelance,
		date_prevue: DateTime<Utc>,
	) -> Result<Self, DevisError> {
		if devis_id <= 0 {
			return Err(DevisError::RelanceValidation(
				"L'ID du devis est obligatoire et doit etre positif".into(),
			));
		}
		if numero_relance < 1 {
			return Err(DevisError::RelanceValidation(
				"Le numero de relance doit etre >= 1".into(),
			));
		}
		Ok(Self {
			id: None,
			devis_id,
			numero_relance,
			type_relance,
			date_prevue,
			date_envoi: None,
			statut: StatutRelance::Planifiee,
			message_personnalise: None,
			created_at: None,
		})
	}

	pub fn est_planifiee(&self) -> bool {
		self.statut == StatutRelance::Planifiee
	}

	pub fn est_envoyee(&self) -> bool {
		self.statut == StatutRelance::Envoyee
	}

	/// True when a planned relance is past its due date.
	pub fn est_en_retard(&self, maintenant: DateTime<Utc>) -> bool {
		self.est_planifiee() && maintenant >= self.date_prevue
	}

	/// Marks the relance as sent; only planned relances may be sent.
	pub fn envoyer(&mut self) -> Result<(), DevisError> {
		if !self.est_planifiee() {
			return Err(DevisError::RelanceValidation(format!(
				"Impossible d'envoyer une relance en statut '{:?}'",
				self.statut
			)));
		}
		self.statut = StatutRelance::Envoyee;
		self.date_envoi = Some(Utc::now());
		Ok(())
	}

	/// Cancels the relance; only planned relances may be cancelled.
	pub fn annuler(&mut self) -> Result<(), DevisError> {
		if !self.est_planifiee() {
			return Err(DevisError::RelanceValidation(format!(
				"Impossible d'annuler une relance en statut '{:?}'",
				self.statut
			)));
		}
		self.statut = StatutRelance::Annulee;
		Ok(())
	}
}
