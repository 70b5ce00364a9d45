//! Price-library articles.
//!
//! An article is a reusable priced element (material, work item, labor)
//! referenced by quote lines. Articles are soft-deleted and can be
//! deactivated without losing the lines that reference them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DevisError;

/// Measurement units used across the price library and quote lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniteArticle {
	M2,
	M3,
	Ml,
	U,
	Kg,
	T,
	Heure,
	Jour,
	Forfait,
	L,
	Ens,
}

impl UniteArticle {
	pub fn label(&self) -> &'static str {
		match self {
			Self::M2 => "Metre carre",
			Self::M3 => "Metre cube",
			Self::Ml => "Metre lineaire",
			Self::U => "Unite",
			Self::Kg => "Kilogramme",
			Self::T => "Tonne",
			Self::Heure => "Heure",
			Self::Jour => "Jour",
			Self::Forfait => "Forfait",
			Self::L => "Litre",
			Self::Ens => "Ensemble",
		}
	}

	/// Short symbol used on printed documents.
	pub fn symbole(&self) -> &'static str {
		match self {
			Self::M2 => "m\u{00b2}",
			Self::M3 => "m\u{00b3}",
			Self::Ml => "ml",
			Self::U => "u",
			Self::Kg => "kg",
			Self::T => "t",
			Self::Heure => "h",
			Self::Jour => "j",
			Self::Forfait => "fft",
			Self::L => "L",
			Self::Ens => "ens",
		}
	}
}

/// Categories organizing the price library by trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorieArticle {
	GrosOeuvre,
	SecondOeuvre,
	Electricite,
	Plomberie,
	ChauffageClim,
	Menuiserie,
	Peinture,
	Couverture,
	Terrassement,
	Vrd,
	Charpente,
	Isolation,
	Carrelage,
	MainOeuvre,
	Materiel,
	Divers,
}

impl CategorieArticle {
	pub fn label(&self) -> &'static str {
		match self {
			Self::GrosOeuvre => "Gros oeuvre",
			Self::SecondOeuvre => "Second oeuvre",
			Self::Electricite => "Electricite",
			Self::Plomberie => "Plomberie",
			Self::ChauffageClim => "Chauffage / Climatisation",
			Self::Menuiserie => "Menuiserie",
			Self::Peinture => "Peinture",
			Self::Couverture => "Couverture",
			Self::Terrassement => "Terrassement",
			Self::Vrd => "Voirie et Reseaux Divers",
			Self::Charpente => "Charpente",
			Self::Isolation => "Isolation",
			Self::Carrelage => "Carrelage",
			Self::MainOeuvre => "Main d'oeuvre",
			Self::Materiel => "Materiel",
			Self::Divers => "Divers",
		}
	}
}

/// A price-library entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
	/// Unique identifier (None until persisted).
	pub id: Option<i64>,
	/// Unique article code.
	pub code: String,
	pub libelle: String,
	pub description: Option<String>,
	pub unite: UniteArticle,
	pub prix_unitaire_ht: Decimal,
	pub categorie: CategorieArticle,
	/// Optional detailed sub-components, stored as JSON.
	pub composants_json: Option<serde_json::Value>,
	pub actif: bool,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
	pub created_by: Option<i64>,
	pub deleted_at: Option<DateTime<Utc>>,
	pub deleted_by: Option<i64>,
}

impl Article {
	/// Builds a validated article.
	pub fn new(
		code: impl Into<String>,
		libelle: impl Into<String>,
		unite: UniteArticle,
		prix_unitaire_ht: Decimal,
		categorie: CategorieArticle,
	) -> Result<Self, DevisError> {
		let code = code.into();
		let libelle = libelle.into();
		if code.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le code de l'article est obligatoire".into(),
			));
		}
		if libelle.trim().is_empty() {
			return Err(DevisError::Validation(
				"Le libelle de l'article est obligatoire".into(),
			));
		}
		if prix_unitaire_ht < Decimal::ZERO {
			return Err(DevisError::Validation(
				"Le prix unitaire HT ne peut pas etre negatif".into(),
			));
		}
		Ok(Self {
			id: None,
			code,
			libelle,
			description: None,
			unite,
			prix_unitaire_ht,
			categorie,
			composants_json: None,
			actif: true,
			created_at: None,
			updated_at: None,
			created_by: None,
			deleted_at: None,
			deleted_by: None,
		})
	}

	pub fn est_supprime(&self) -> bool {
		self.deleted_at.is_some()
	}

	pub fn desactiver(&mut self) {
		self.actif = false;
		self.updated_at = Some(Utc::now());
	}

	pub fn activer(&mut self) {
		self.actif = true;
		self.updated_at = Some(Utc::now());
	}

	/// Updates the unit price, rejecting negative values.
	pub fn mettre_a_jour_prix(&mut self, nouveau_prix: Decimal) -> Result<(), DevisError> {
		if nouveau_prix < Decimal::ZERO {
			return Err(DevisError::Validation(
				"Le prix unitaire HT ne peut pas etre negatif".into(),
			));
		}
		self.prix_unitaire_ht = nouveau_prix;
		self.updated_at = Some(Utc::now());
		Ok(())
	}

	/// Marks the article soft-deleted.
	pub fn supprimer(&mut self, deleted_by: i64) {
		self.deleted_at = Some(Utc::now());
		self.deleted_by = Some(deleted_by);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_creation_valide() {
		let article = Article::new(
			"GO-001",
			"Beton C25/30",
			UniteArticle::M3,
			Decimal::from(120),
			CategorieArticle::GrosOeuvre,
		)
		.unwrap();
		assert!(article.actif);
		assert!(!article.est_supprime());
	}

	#[test]
	fn test_code_obligatoire() {
		let err = Article::new(
			"  ",
			"Beton",
			UniteArticle::M3,
			Decimal::from(120),
			CategorieArticle::GrosOeuvre,
		)
		.unwrap_err();
		assert_eq!(err.kind(), "devis_validation");
	}

	#[test]
	fn test_prix_negatif_refuse() {
		let mut article = Article::new(
			"GO-001",
			"Beton",
			UniteArticle::M3,
			Decimal::from(120),
			CategorieArticle::GrosOeuvre,
		)
		.unwrap();
		assert!(article.mettre_a_jour_prix(Decimal::from(-1)).is_err());
		assert_eq!(article.prix_unitaire_ht, Decimal::from(120));
	}
}
