//! Client document projection and PDF generation.
//!
//! The use case assembles the full rendering-ready projection: quote
//! header, VAT ventilation sorted by ascending rate, retention block
//! when the rate is positive, net to pay, the lot/line tree and the
//! legal mention when a reduced rate appears. Debourse-level fields are
//! deliberately absent from the projection.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DevisRepository, FraisChantierRepository, JournalDevisRepository, LigneDevisRepository,
	LotDevisRepository,
};
use btp_types::{
	arrondir_montant, calculer_tva, Devis, DevisError, FraisChantierDevis, JournalDevis,
	OptionsPresentation, RetenueGarantie,
};

use crate::ports::PdfGenerator;
use crate::services::numerotation::NumerotationService;

/// Legal mention printed when a reduced VAT rate applies.
pub const MENTION_TVA_REDUITE: &str = "TVA reduite applicable sous reserve de la remise de \
	l'attestation CERFA signee par le client avant facturation (article 279-0 bis du CGI).";

/// One VAT rate bucket of the ventilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentilationTva {
	pub taux: Decimal,
	pub base_ht: Decimal,
	pub montant_tva: Decimal,
	pub montant_ttc: Decimal,
}

/// Line projection for the client document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LigneDetail {
	pub code: String,
	pub designation: String,
	pub unite: String,
	pub quantite: Option<Decimal>,
	pub prix_unitaire_ht: Option<Decimal>,
	pub taux_tva: Decimal,
	pub montant_ht: Decimal,
}

/// Lot projection with nested sub-lots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotDetail {
	pub code_lot: String,
	pub libelle: String,
	pub montant_ht: Decimal,
	pub lignes: Vec<LigneDetail>,
	pub sous_lots: Vec<LotDetail>,
}

/// Expense row of the client document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraisDetail {
	pub libelle: String,
	pub montant_ht: Decimal,
	pub montant_ttc: Decimal,
}

/// Rendering-ready projection of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevisDetail {
	pub devis_id: i64,
	pub numero: String,
	pub client_nom: String,
	pub client_adresse: Option<String>,
	pub client_email: Option<String>,
	pub objet: Option<String>,
	pub date_creation: Option<String>,
	pub date_validite: Option<String>,
	pub montant_total_ht: Decimal,
	pub montant_total_ttc: Decimal,
	pub ventilation_tva: Vec<VentilationTva>,
	/// Present only when the retention rate is positive.
	pub retenue_garantie: Option<(Decimal, Decimal)>,
	pub net_a_payer: Decimal,
	pub lots: Vec<LotDetail>,
	pub frais: Vec<FraisDetail>,
	pub mention_legale: Option<String>,
	pub conditions_generales: Option<String>,
	pub options: OptionsPresentation,
}

/// Builds the client projection of a quote.
pub struct ConstruireDevisDetailUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub frais_repo: Arc<dyn FraisChantierRepository>,
}

impl ConstruireDevisDetailUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(&self, devis_id: i64) -> Result<DevisDetail, DevisError> {
		let devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		let lots = self.lot_repo.find_by_devis(devis_id).await?;
		let frais = self.frais_repo.find_by_devis(devis_id).await?;
		let options = devis.options_presentation.clone();

		let mut lignes_par_lot = std::collections::HashMap::new();
		for lot in &lots {
			let lot_id = lot.id.unwrap_or_default();
			lignes_par_lot.insert(lot_id, self.ligne_repo.find_by_lot(lot_id).await?);
		}

		// VAT ventilation, ascending by rate
		let mut ventilation: Vec<VentilationTva> = Vec::new();
		let mut taux_reduit_present = false;
		for lignes in lignes_par_lot.values() {
			for ligne in lignes {
				let taux = ligne.taux_tva.taux();
				if taux > Decimal::ZERO && taux < Decimal::from(20) {
					taux_reduit_present = true;
				}
				match ventilation.iter_mut().find(|v| v.taux == taux) {
					Some(bucket) => bucket.base_ht += ligne.total_ht,
					None => ventilation.push(VentilationTva {
						taux,
						base_ht: ligne.total_ht,
						montant_tva: Decimal::ZERO,
						montant_ttc: Decimal::ZERO,
					}),
				}
			}
		}
		for bucket in &mut ventilation {
			bucket.base_ht = arrondir_montant(bucket.base_ht);
			bucket.montant_tva = calculer_tva(bucket.base_ht, bucket.taux);
			bucket.montant_ttc = bucket.base_ht + bucket.montant_tva;
		}
		ventilation.sort_by(|a, b| a.taux.cmp(&b.taux));

		let retenue = RetenueGarantie::new(devis.retenue_garantie_pct)
			.unwrap_or_else(|_| RetenueGarantie::aucune());
		let retenue_garantie = if retenue.taux() > Decimal::ZERO {
			Some((retenue.taux(), retenue.calculer_montant(devis.montant_total_ttc)))
		} else {
			None
		};
		let net_a_payer = retenue.montant_net_a_payer(devis.montant_total_ttc);

		let arbre = construire_lots(&devis, &lots, &lignes_par_lot, None);

		let frais_detail = frais
			.iter()
			.map(|f: &FraisChantierDevis| FraisDetail {
				libelle: f.libelle.clone(),
				montant_ht: f.montant_ht,
				montant_ttc: f.montant_ttc(),
			})
			.collect();

		Ok(DevisDetail {
			devis_id,
			numero: devis.numero.clone(),
			client_nom: devis.client_nom.clone(),
			client_adresse: devis.client_adresse.clone(),
			client_email: devis.client_email.clone(),
			objet: devis.objet.clone(),
			date_creation: devis.date_creation.map(|d| d.to_string()),
			date_validite: devis.date_validite.map(|d| d.to_string()),
			montant_total_ht: devis.montant_total_ht,
			montant_total_ttc: devis.montant_total_ttc,
			ventilation_tva: ventilation,
			retenue_garantie,
			net_a_payer,
			lots: arbre,
			frais: frais_detail,
			mention_legale: taux_reduit_present.then(|| MENTION_TVA_REDUITE.to_string()),
			conditions_generales: devis.conditions_generales.clone(),
			options,
		})
	}

}

fn construire_lots(
	devis: &Devis,
	lots: &[btp_types::LotDevis],
	lignes_par_lot: &std::collections::HashMap<i64, Vec<btp_types::LigneDevis>>,
	parent: Option<i64>,
) -> Vec<LotDetail> {
	let options = &devis.options_presentation;
	lots.iter()
		.filter(|l| l.parent_id == parent)
		.map(|lot| {
			let lot_id = lot.id.unwrap_or_default();
			let lignes = lignes_par_lot
				.get(&lot_id)
				.map(|lignes| {
					lignes
						.iter()
						.enumerate()
						.map(|(index, ligne)| LigneDetail {
							code: NumerotationService::generer_code_ligne(
								index,
								&lot.code_lot,
							),
							designation: ligne.libelle.clone(),
							unite: ligne.unite.symbole().to_string(),
							quantite: options
								.afficher_quantites()
								.then_some(ligne.quantite),
							prix_unitaire_ht: options
								.afficher_prix_unitaires()
								.then_some(ligne.prix_unitaire_ht),
							taux_tva: ligne.taux_tva.taux(),
							montant_ht: ligne.total_ht,
						})
						.collect()
				})
				.unwrap_or_default();
			LotDetail {
				code_lot: lot.code_lot.clone(),
				libelle: lot.libelle.clone(),
				montant_ht: lot.montant_vente_ht,
				lignes,
				sous_lots: construire_lots(devis, lots, lignes_par_lot, Some(lot_id)),
			}
		})
		.collect()
}

/// Renders a quote to PDF bytes through the generator port.
pub struct GenerateDevisPdfUseCase {
	pub detail: ConstruireDevisDetailUseCase,
	pub pdf_generator: Arc<dyn PdfGenerator>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl GenerateDevisPdfUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		genere_par: i64,
	) -> Result<(Vec<u8>, String), DevisError> {
		let detail = self.detail.execute(devis_id).await?;
		let bytes = self.pdf_generator.generate(&detail).await?;
		let nom_fichier = format!("devis_{}.pdf", detail.numero);

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"generation_pdf",
				Some(genere_par),
				Some(json!({ "fichier": nom_fichier, "taille": bytes.len() })),
			)?)
			.await?;

		Ok((bytes, nom_fichier))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores, FakePdfGenerator};
	use btp_storage::MemoryStores;
	use btp_types::{LigneDevis, LotDevis, TauxTVA, UniteArticle};

	async fn fixture(s: &Arc<MemoryStores>) -> i64 {
		let mut devis = Devis::new("DEV-2026-001", "Client").unwrap();
		devis.retenue_garantie_pct = dec("5");
		devis.montant_total_ht = dec("10000");
		devis.montant_total_ttc = dec("12000");
		let devis = s.devis.save(devis).await.unwrap();
		let devis_id = devis.id.unwrap();
		let lot = s
			.lots
			.save(LotDevis::new(devis_id, "1", "Gros oeuvre", 0).unwrap())
			.await
			.unwrap();
		for (libelle, taux, total) in [("Maconnerie", "20", "8000"), ("Isolation", "5.5", "2000")]
		{
			let mut ligne = LigneDevis::new(
				lot.id.unwrap(),
				libelle,
				UniteArticle::M2,
				dec("1"),
				dec(total),
				TauxTVA::new(dec(taux)).unwrap(),
			)
			.unwrap();
			ligne.total_ht = dec(total);
			s.lignes.save(ligne).await.unwrap();
		}
		devis_id
	}

	fn detail(s: &Arc<MemoryStores>) -> ConstruireDevisDetailUseCase {
		ConstruireDevisDetailUseCase {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			frais_repo: s.frais.clone(),
		}
	}

	#[tokio::test]
	async fn test_ventilation_triee_et_mention() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let projection = detail(&s).execute(devis_id).await.unwrap();

		// Ascending by rate
		assert_eq!(projection.ventilation_tva.len(), 2);
		assert_eq!(projection.ventilation_tva[0].taux, dec("5.5"));
		assert_eq!(projection.ventilation_tva[0].montant_tva, dec("110.00"));
		assert_eq!(projection.ventilation_tva[1].taux, dec("20"));
		assert_eq!(projection.ventilation_tva[1].montant_tva, dec("1600.00"));

		// Reduced rate present: legal mention included
		assert!(projection.mention_legale.is_some());
	}

	#[tokio::test]
	async fn test_retenue_et_net_a_payer() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let projection = detail(&s).execute(devis_id).await.unwrap();
		let (taux, montant) = projection.retenue_garantie.unwrap();
		assert_eq!(taux, dec("5"));
		assert_eq!(montant, dec("600.00"));
		assert_eq!(projection.net_a_payer, dec("11400.00"));
	}

	#[tokio::test]
	async fn test_projection_sans_debourse() {
		// The serialized lot/line tree never carries cost fields
		let s = stores();
		let devis_id = fixture(&s).await;
		let projection = detail(&s).execute(devis_id).await.unwrap();
		let json = serde_json::to_string(&projection.lots).unwrap();
		assert!(!json.contains("debourse"));
		assert!(!json.contains("prix_revient"));
		assert!(!json.contains("marge"));
		// And the debourse display flag stays off
		assert!(!projection.options.afficher_debourses());
	}

	#[tokio::test]
	async fn test_generation_pdf() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let (bytes, nom) = GenerateDevisPdfUseCase {
			detail: detail(&s),
			pdf_generator: Arc::new(FakePdfGenerator),
			journal_repo: s.journal.clone(),
		}
		.execute(devis_id, 1)
		.await
		.unwrap();
		assert!(bytes.starts_with(b"%PDF"));
		assert_eq!(nom, "devis_DEV-2026-001.pdf");

		let journal = s.journal.find_by_devis(devis_id).await.unwrap();
		assert_eq!(journal.last().unwrap().action, "generation_pdf");
	}

	#[tokio::test]
	async fn test_options_minimalistes_masquent_quantites() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let mut devis = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		devis.options_presentation =
			OptionsPresentation::from_template("minimaliste").unwrap();
		s.devis.save(devis).await.unwrap();

		let projection = detail(&s).execute(devis_id).await.unwrap();
		let ligne = &projection.lots[0].lignes[0];
		assert!(ligne.quantite.is_none());
		assert!(ligne.prix_unitaire_ht.is_none());
	}
}
