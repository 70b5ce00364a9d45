//! Versioning use cases: revisions, variants, family listing and
//! freezing.
//!
//! Both clone operations deep-copy the quote with its lots, lines and
//! discharge details. A revision freezes its source automatically and
//! numbers `base-R<n>`; a variant keeps the source live and numbers
//! `base-<LABEL>` with a label in {ECO, STD, PREM, ALT}. Clones restart
//! in draft, unlocked, with soft-delete flags cleared.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::{
	DebourseDetailRepository, DevisRepository, JournalDevisRepository, LigneDevisRepository,
	LotDevisRepository,
};
use btp_types::{
	libelle_variante, Devis, DevisError, JournalDevis, StatutDevis, TypeVersion,
};

/// Strips any revision or variant suffix from a quote number.
fn numero_base(numero: &str) -> &str {
	let mut base = numero;
	for suffixe in ["-R", "-ECO", "-STD", "-PREM", "-ALT"] {
		if let Some(position) = base.find(suffixe) {
			// Only treat -R as a suffix when followed by digits
			if suffixe == "-R" {
				let reste = &base[position + 2..];
				if reste.is_empty() || !reste.chars().all(|c| c.is_ascii_digit()) {
					continue;
				}
			}
			base = &base[..position];
		}
	}
	base
}

/// Id of the family original: the quote's parent when it has one, else
/// the quote itself.
fn racine_famille(devis: &Devis) -> i64 {
	devis.devis_parent_id.or(devis.id).unwrap_or_default()
}

/// Shared repositories of the clone operations.
pub struct VersionRepos {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub lot_repo: Arc<dyn LotDevisRepository>,
	pub ligne_repo: Arc<dyn LigneDevisRepository>,
	pub debourse_repo: Arc<dyn DebourseDetailRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl VersionRepos {
	/// Deep copy of a quote with lots, lines and discharge details.
	#[allow(clippy::too_many_arguments)]
	async fn copie_profonde(
		&self,
		source: &Devis,
		nouveau_numero: String,
		type_version: TypeVersion,
		devis_parent_id: i64,
		numero_version: i32,
		label_variante: Option<String>,
		commentaire: Option<String>,
		created_by: i64,
	) -> Result<Devis, DevisError> {
		let mut clone = source.clone();
		clone.id = None;
		clone.numero = nouveau_numero;
		clone.statut = StatutDevis::Brouillon;
		clone.chantier_ref = source.chantier_ref.clone();
		clone.devis_parent_id = Some(devis_parent_id);
		clone.numero_version = numero_version;
		clone.type_version = type_version;
		clone.label_variante = label_variante;
		clone.version_commentaire = commentaire;
		clone.version_figee = false;
		clone.figee_at = None;
		clone.figee_par = None;
		clone.created_by = Some(created_by);
		clone.created_at = None;
		clone.updated_at = None;
		clone.deleted_at = None;
		clone.deleted_by = None;
		let clone = self.devis_repo.save(clone).await?;
		let clone_id = clone.id.unwrap();

		// Copy lots parents-first so children can remap their parent id.
		// A child always references an earlier-created lot, so id order
		// yields parents before children at any depth.
		let mut lots = self.lot_repo.find_by_devis(source.id.unwrap_or_default()).await?;
		lots.sort_by_key(|l| l.id);
		let mut correspondance: HashMap<i64, i64> = HashMap::new();
		for lot_source in lots {
			let source_lot_id = lot_source.id.unwrap_or_default();
			let mut nouveau_lot = lot_source.clone();
			nouveau_lot.id = None;
			nouveau_lot.devis_id = clone_id;
			nouveau_lot.parent_id = lot_source
				.parent_id
				.and_then(|p| correspondance.get(&p).copied());
			nouveau_lot.created_by = Some(created_by);
			nouveau_lot.created_at = None;
			nouveau_lot.updated_at = None;
			nouveau_lot.deleted_at = None;
			nouveau_lot.deleted_by = None;
			let nouveau_lot = self.lot_repo.save(nouveau_lot).await?;
			correspondance.insert(source_lot_id, nouveau_lot.id.unwrap());

			for ligne_source in self.ligne_repo.find_by_lot(source_lot_id).await? {
				let source_ligne_id = ligne_source.id.unwrap_or_default();
				let mut nouvelle_ligne = ligne_source.clone();
				nouvelle_ligne.id = None;
				nouvelle_ligne.lot_devis_id = nouveau_lot.id.unwrap();
				// Survey locks do not carry over to the copy
				nouvelle_ligne.verrouille = false;
				nouvelle_ligne.created_by = Some(created_by);
				nouvelle_ligne.created_at = None;
				nouvelle_ligne.updated_at = None;
				nouvelle_ligne.deleted_at = None;
				nouvelle_ligne.deleted_by = None;
				let nouvelle_ligne = self.ligne_repo.save(nouvelle_ligne).await?;

				let debourses = self.debourse_repo.find_by_ligne(source_ligne_id).await?;
				let copies = debourses
					.into_iter()
					.map(|mut d| {
						d.id = None;
						d.ligne_devis_id = nouvelle_ligne.id.unwrap();
						d.created_at = None;
						d.updated_at = None;
						d
					})
					.collect();
				self.debourse_repo
					.replace_for_ligne(nouvelle_ligne.id.unwrap(), copies)
					.await?;
			}
		}

		Ok(clone)
	}

	async fn charger(&self, devis_id: i64) -> Result<Devis, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })
	}

	async fn numero_de_base(&self, source: &Devis, racine: i64) -> Result<String, DevisError> {
		let numero = if source.devis_parent_id.is_some() {
			match self.devis_repo.find_by_id(racine).await? {
				Some(parent) => parent.numero,
				None => source.numero.clone(),
			}
		} else {
			source.numero.clone()
		};
		Ok(numero_base(&numero).to_string())
	}
}

/// Creates a revision, freezing the source version first.
pub struct CreerRevisionUseCase {
	pub repos: VersionRepos,
}

impl CreerRevisionUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		commentaire: Option<String>,
		created_by: i64,
	) -> Result<Devis, DevisError> {
		let mut source = self.repos.charger(devis_id).await?;
		let racine = racine_famille(&source);
		let version = self.repos.devis_repo.get_next_version_number(racine).await?;
		let base = self.repos.numero_de_base(&source, racine).await?;
		let nouveau_numero = format!("{}-R{}", base, version);

		// The previous version freezes automatically
		if !source.version_figee {
			source.figer(created_by)?;
			source = self.repos.devis_repo.save(source).await?;
			self.repos
				.journal_repo
				.save(JournalDevis::new(
					devis_id,
					"gel_version",
					Some(created_by),
					Some(json!({
						"message": format!(
							"Version figee automatiquement avant creation de la revision {}",
							nouveau_numero
						),
					})),
				)?)
				.await?;
		}

		let revision = self
			.repos
			.copie_profonde(
				&source,
				nouveau_numero.clone(),
				TypeVersion::Revision,
				racine,
				version,
				None,
				commentaire,
				created_by,
			)
			.await?;

		self.repos
			.journal_repo
			.save(JournalDevis::new(
				revision.id.unwrap(),
				"creation_revision",
				Some(created_by),
				Some(json!({
					"devis_source_id": devis_id,
					"numero_version": version,
					"numero": nouveau_numero,
				})),
			)?)
			.await?;

		Ok(revision)
	}
}

/// Creates a labeled variant without freezing the source.
pub struct CreerVarianteUseCase {
	pub repos: VersionRepos,
}

impl CreerVarianteUseCase {
	#[instrument(skip_all, fields(devis_id, label))]
	pub async fn execute(
		&self,
		devis_id: i64,
		label: &str,
		commentaire: Option<String>,
		created_by: i64,
	) -> Result<Devis, DevisError> {
		let label = label.trim().to_uppercase();
		let libelle = libelle_variante(&label).ok_or_else(|| {
			DevisError::Validation(format!(
				"Label de variante invalide: '{}'. Labels autorises: ECO, STD, PREM, ALT",
				label
			))
		})?;

		let source = self.repos.charger(devis_id).await?;
		let racine = racine_famille(&source);
		let version = self.repos.devis_repo.get_next_version_number(racine).await?;
		let base = self.repos.numero_de_base(&source, racine).await?;
		let nouveau_numero = format!("{}-{}", base, label);

		let variante = self
			.repos
			.copie_profonde(
				&source,
				nouveau_numero.clone(),
				TypeVersion::Variante,
				racine,
				version,
				Some(label.clone()),
				commentaire,
				created_by,
			)
			.await?;

		self.repos
			.journal_repo
			.save(JournalDevis::new(
				variante.id.unwrap(),
				"creation_variante",
				Some(created_by),
				Some(json!({
					"devis_source_id": devis_id,
					"label_variante": label,
					"libelle": libelle,
					"numero": nouveau_numero,
				})),
			)?)
			.await?;

		Ok(variante)
	}
}

/// Lists the whole family of a quote (original + revisions + variants).
pub struct ListerVersionsUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
}

impl ListerVersionsUseCase {
	pub async fn execute(&self, devis_id: i64) -> Result<Vec<Devis>, DevisError> {
		self.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		Ok(self.devis_repo.find_versions(devis_id).await?)
	}
}

/// Freezes a version manually.
pub struct FigerVersionUseCase {
	pub devis_repo: Arc<dyn DevisRepository>,
	pub journal_repo: Arc<dyn JournalDevisRepository>,
}

impl FigerVersionUseCase {
	#[instrument(skip_all, fields(devis_id))]
	pub async fn execute(
		&self,
		devis_id: i64,
		commentaire: Option<String>,
		fige_par: i64,
	) -> Result<Devis, DevisError> {
		let mut devis = self
			.devis_repo
			.find_by_id(devis_id)
			.await?
			.ok_or(DevisError::DevisNotFound { devis_id })?;
		devis.figer(fige_par)?;
		if commentaire.is_some() {
			devis.version_commentaire = commentaire.clone();
		}
		let devis = self.devis_repo.save(devis).await?;

		self.journal_repo
			.save(JournalDevis::new(
				devis_id,
				"gel_version",
				Some(fige_par),
				Some(json!({
					"message": format!("Version {} figee manuellement", devis.numero),
					"commentaire": commentaire,
				})),
			)?)
			.await?;
		Ok(devis)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};
	use btp_storage::MemoryStores;
	use btp_types::{
		DebourseDetail, LigneDevis, LotDevis, NatureDebourse, TauxTVA, UniteArticle,
	};

	fn repos(s: &Arc<MemoryStores>) -> VersionRepos {
		VersionRepos {
			devis_repo: s.devis.clone(),
			lot_repo: s.lots.clone(),
			ligne_repo: s.lignes.clone(),
			debourse_repo: s.debourses.clone(),
			journal_repo: s.journal.clone(),
		}
	}

	async fn fixture(s: &Arc<MemoryStores>) -> i64 {
		let devis = s
			.devis
			.save(Devis::new("DEV-2026-042", "Client").unwrap())
			.await
			.unwrap();
		let devis_id = devis.id.unwrap();
		let racine = s
			.lots
			.save(LotDevis::new(devis_id, "1", "Gros oeuvre", 0).unwrap())
			.await
			.unwrap();
		let mut enfant = LotDevis::new(devis_id, "1.1", "Fondations", 0).unwrap();
		enfant.parent_id = racine.id;
		let enfant = s.lots.save(enfant).await.unwrap();
		let mut ligne = LigneDevis::new(
			enfant.id.unwrap(),
			"Semelle filante",
			UniteArticle::Ml,
			dec("20"),
			dec("80"),
			TauxTVA::standard(),
		)
		.unwrap();
		ligne.verrouille = true;
		let ligne = s.lignes.save(ligne).await.unwrap();
		let ligne_id = ligne.id.unwrap();
		s.debourses
			.replace_for_ligne(
				ligne_id,
				vec![DebourseDetail::new(
					ligne_id,
					NatureDebourse::Materiaux,
					"Beton",
					dec("4"),
					dec("110"),
				)
				.unwrap()],
			)
			.await
			.unwrap();
		devis_id
	}

	#[tokio::test]
	async fn test_revision_fige_la_source_et_copie_tout() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let revision = CreerRevisionUseCase { repos: repos(&s) }
			.execute(devis_id, Some("prix acier".into()), 1)
			.await
			.unwrap();

		assert_eq!(revision.numero, "DEV-2026-042-R2");
		assert_eq!(revision.type_version, TypeVersion::Revision);
		assert_eq!(revision.statut, StatutDevis::Brouillon);
		assert_eq!(revision.devis_parent_id, Some(devis_id));

		// Source frozen automatically
		let source = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert!(source.version_figee);

		// Deep copy: lots with remapped parent, lines unlocked, debourses
		let lots = s.lots.find_by_devis(revision.id.unwrap()).await.unwrap();
		assert_eq!(lots.len(), 2);
		let enfant = lots.iter().find(|l| l.parent_id.is_some()).unwrap();
		let racine = lots.iter().find(|l| l.parent_id.is_none()).unwrap();
		assert_eq!(enfant.parent_id, racine.id);
		let lignes = s.lignes.find_by_lot(enfant.id.unwrap()).await.unwrap();
		assert_eq!(lignes.len(), 1);
		assert!(!lignes[0].verrouille);
		let debourses = s
			.debourses
			.find_by_ligne(lignes[0].id.unwrap())
			.await
			.unwrap();
		assert_eq!(debourses.len(), 1);

		// Freezing the already-frozen source now fails
		let mut source = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert!(source.figer(1).is_err());
	}

	#[tokio::test]
	async fn test_variante_ne_fige_pas() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let variante = CreerVarianteUseCase { repos: repos(&s) }
			.execute(devis_id, "eco", None, 1)
			.await
			.unwrap();
		assert_eq!(variante.numero, "DEV-2026-042-ECO");
		assert_eq!(variante.type_version, TypeVersion::Variante);
		assert_eq!(variante.label_variante.as_deref(), Some("ECO"));

		let source = s.devis.find_by_id(devis_id).await.unwrap().unwrap();
		assert!(!source.version_figee);
	}

	#[tokio::test]
	async fn test_label_variante_invalide() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let err = CreerVarianteUseCase { repos: repos(&s) }
			.execute(devis_id, "LUXE", None, 1)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "devis_validation");
	}

	#[tokio::test]
	async fn test_revision_de_revision_garde_la_base() {
		let s = stores();
		let devis_id = fixture(&s).await;
		let uc = CreerRevisionUseCase { repos: repos(&s) };
		let r2 = uc.execute(devis_id, None, 1).await.unwrap();
		let r3 = uc.execute(r2.id.unwrap(), None, 1).await.unwrap();
		assert_eq!(r3.numero, "DEV-2026-042-R3");
		assert_eq!(r3.devis_parent_id, Some(devis_id));

		let famille = ListerVersionsUseCase {
			devis_repo: s.devis.clone(),
		}
		.execute(devis_id)
		.await
		.unwrap();
		assert_eq!(famille.len(), 3);
		assert_eq!(famille[0].numero_version, 1);
	}

	#[tokio::test]
	async fn test_numero_base() {
		assert_eq!(numero_base("DEV-2026-042"), "DEV-2026-042");
		assert_eq!(numero_base("DEV-2026-042-R2"), "DEV-2026-042");
		assert_eq!(numero_base("DEV-2026-042-ECO"), "DEV-2026-042");
	}
}
