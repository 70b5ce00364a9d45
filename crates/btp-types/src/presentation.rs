//! Presentation options for client-facing documents.
//!
//! Ten display flags plus a template name. Debourse visibility is forced
//! to false in every construction path: costs are never shown to the
//! client, even in the detailed template.

use serde::{Deserialize, Serialize};

use crate::error::DevisError;

/// Predefined template names.
pub const TEMPLATES_VALIDES: [&str; 4] = ["standard", "simplifie", "detaille", "minimaliste"];

/// Immutable bag of presentation flags for a quote rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsPresentation {
	afficher_debourses: bool,
	afficher_composants: bool,
	afficher_quantites: bool,
	afficher_prix_unitaires: bool,
	afficher_tva_detaillee: bool,
	afficher_conditions_generales: bool,
	afficher_logo: bool,
	afficher_coordonnees_entreprise: bool,
	afficher_retenue_garantie: bool,
	afficher_frais_chantier_detail: bool,
	template_nom: String,
}

/// Raw flag input for [`OptionsPresentation::new`].
#[derive(Debug, Clone)]
pub struct OptionsPresentationInput {
	pub afficher_composants: bool,
	pub afficher_quantites: bool,
	pub afficher_prix_unitaires: bool,
	pub afficher_tva_detaillee: bool,
	pub afficher_conditions_generales: bool,
	pub afficher_logo: bool,
	pub afficher_coordonnees_entreprise: bool,
	pub afficher_retenue_garantie: bool,
	pub afficher_frais_chantier_detail: bool,
}

impl Default for OptionsPresentationInput {
	fn default() -> Self {
		Self {
			afficher_composants: false,
			afficher_quantites: true,
			afficher_prix_unitaires: true,
			afficher_tva_detaillee: true,
			afficher_conditions_generales: true,
			afficher_logo: true,
			afficher_coordonnees_entreprise: true,
			afficher_retenue_garantie: true,
			afficher_frais_chantier_detail: true,
		}
	}
}

impl OptionsPresentation {
	/// Builds options from explicit flags. `afficher_debourses` is not
	/// accepted as input: it is always false.
	pub fn new(
		input: OptionsPresentationInput,
		template_nom: impl Into<String>,
	) -> Result<Self, DevisError> {
		let template_nom = template_nom.into();
		if !TEMPLATES_VALIDES.contains(&template_nom.as_str()) {
			return Err(DevisError::PresentationInvalide(format!(
				"Template '{}' invalide. Templates disponibles: {}",
				template_nom,
				TEMPLATES_VALIDES.join(", ")
			)));
		}
		Ok(Self {
			afficher_debourses: false,
			afficher_composants: input.afficher_composants,
			afficher_quantites: input.afficher_quantites,
			afficher_prix_unitaires: input.afficher_prix_unitaires,
			afficher_tva_detaillee: input.afficher_tva_detaillee,
			afficher_conditions_generales: input.afficher_conditions_generales,
			afficher_logo: input.afficher_logo,
			afficher_coordonnees_entreprise: input.afficher_coordonnees_entreprise,
			afficher_retenue_garantie: input.afficher_retenue_garantie,
			afficher_frais_chantier_detail: input.afficher_frais_chantier_detail,
			template_nom,
		})
	}

	/// Builds options from a predefined template.
	pub fn from_template(template_nom: &str) -> Result<Self, DevisError> {
		let input = match template_nom {
			"standard" => OptionsPresentationInput::default(),
			"simplifie" => OptionsPresentationInput {
				afficher_tva_detaillee: false,
				afficher_frais_chantier_detail: false,
				..OptionsPresentationInput::default()
			},
			"detaille" => OptionsPresentationInput {
				afficher_composants: true,
				..OptionsPresentationInput::default()
			},
			"minimaliste" => OptionsPresentationInput {
				afficher_quantites: false,
				afficher_prix_unitaires: false,
				afficher_tva_detaillee: false,
				afficher_frais_chantier_detail: false,
				..OptionsPresentationInput::default()
			},
			autre => {
				return Err(DevisError::PresentationInvalide(format!(
					"Template '{}' invalide. Templates disponibles: {}",
					autre,
					TEMPLATES_VALIDES.join(", ")
				)))
			}
		};
		Self::new(input, template_nom)
	}

	/// Default options (standard template).
	pub fn defaut() -> Self {
		Self::from_template("standard").expect("le template standard existe")
	}

	pub fn afficher_debourses(&self) -> bool {
		self.afficher_debourses
	}

	pub fn afficher_composants(&self) -> bool {
		self.afficher_composants
	}

	pub fn afficher_quantites(&self) -> bool {
		self.afficher_quantites
	}

	pub fn afficher_prix_unitaires(&self) -> bool {
		self.afficher_prix_unitaires
	}

	pub fn afficher_tva_detaillee(&self) -> bool {
		self.afficher_tva_detaillee
	}

	pub fn afficher_conditions_generales(&self) -> bool {
		self.afficher_conditions_generales
	}

	pub fn afficher_logo(&self) -> bool {
		self.afficher_logo
	}

	pub fn afficher_coordonnees_entreprise(&self) -> bool {
		self.afficher_coordonnees_entreprise
	}

	pub fn afficher_retenue_garantie(&self) -> bool {
		self.afficher_retenue_garantie
	}

	pub fn afficher_frais_chantier_detail(&self) -> bool {
		self.afficher_frais_chantier_detail
	}

	pub fn template_nom(&self) -> &str {
		&self.template_nom
	}
}

impl Default for OptionsPresentation {
	fn default() -> Self {
		Self::defaut()
	}
}
