//! In-memory storage backend.
//!
//! HashMap-based implementations of every repository trait, protected by
//! read-write locks. Fast and recovery-free: the intended uses are tests
//! and the default wiring of the core. Soft-delete filtering happens
//! here, at the repository boundary, so no caller ever sees deleted rows.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use btp_types::{
	Article, AttestationTva, ComparatifDevis, DebourseDetail, Devis, FraisChantierDevis,
	JournalDevis, LigneDevis, LotDevis, RelanceDevis, SignatureDevis, StatutDevis,
};

use crate::{
	ArticleRepository, AttestationTvaRepository, ComparatifRepository,
	DebourseDetailRepository, DevisRepository, FraisChantierRepository,
	JournalDevisRepository, LigneDevisRepository, LotDevisRepository, RechercheDevis,
	RelanceDevisRepository, SignatureDevisRepository, StorageError,
};

fn next(counter: &AtomicI64) -> i64 {
	counter.fetch_add(1, Ordering::SeqCst) + 1
}

/// In-memory quote repository.
#[derive(Default)]
pub struct MemoryDevisRepository {
	rows: RwLock<HashMap<i64, Devis>>,
	next_id: AtomicI64,
}

impl MemoryDevisRepository {
	pub fn new() -> Self {
		Self::default()
	}

	fn famille_racine(devis: &Devis) -> i64 {
		devis.devis_parent_id.or(devis.id).unwrap_or_default()
	}
}

#[async_trait]
impl DevisRepository for MemoryDevisRepository {
	async fn save(&self, mut devis: Devis) -> Result<Devis, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match devis.id {
			None => {
				// Unique numero check on creation
				if rows
					.values()
					.any(|d| d.numero == devis.numero && d.deleted_at.is_none())
				{
					return Err(StorageError::Conflict(format!(
						"numero {} deja utilise",
						devis.numero
					)));
				}
				devis.id = Some(next(&self.next_id));
				devis.created_at.get_or_insert(now);
				devis.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				devis.updated_at = Some(now);
			}
		}
		rows.insert(devis.id.unwrap(), devis.clone());
		Ok(devis)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<Devis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).filter(|d| d.deleted_at.is_none()).cloned())
	}

	async fn find_by_numero(&self, numero: &str) -> Result<Option<Devis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.find(|d| d.numero == numero && d.deleted_at.is_none())
			.cloned())
	}

	async fn find_all(&self, limit: usize, offset: usize) -> Result<Vec<Devis>, StorageError> {
		let rows = self.rows.read().await;
		let mut tous: Vec<Devis> = rows
			.values()
			.filter(|d| d.deleted_at.is_none())
			.cloned()
			.collect();
		tous.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
		Ok(tous.into_iter().skip(offset).take(limit).collect())
	}

	async fn search(&self, filtres: &RechercheDevis) -> Result<Vec<Devis>, StorageError> {
		let rows = self.rows.read().await;
		let mut resultats: Vec<Devis> = rows
			.values()
			.filter(|d| d.deleted_at.is_none())
			.filter(|d| {
				if let Some(nom) = &filtres.client_nom {
					if !d.client_nom.to_lowercase().contains(&nom.to_lowercase()) {
						return false;
					}
				}
				if let Some(statuts) = &filtres.statuts {
					if !statuts.contains(&d.statut) {
						return false;
					}
				}
				if let Some(debut) = filtres.date_debut {
					if d.date_creation.is_none_or(|dc| dc < debut) {
						return false;
					}
				}
				if let Some(fin) = filtres.date_fin {
					if d.date_creation.is_none_or(|dc| dc > fin) {
						return false;
					}
				}
				if let Some(min) = filtres.montant_min {
					if d.montant_total_ht < min {
						return false;
					}
				}
				if let Some(max) = filtres.montant_max {
					if d.montant_total_ht > max {
						return false;
					}
				}
				if let Some(commercial) = filtres.commercial_id {
					if d.commercial_id != Some(commercial) {
						return false;
					}
				}
				if let Some(conducteur) = filtres.conducteur_id {
					if d.conducteur_id != Some(conducteur) {
						return false;
					}
				}
				if let Some(texte) = &filtres.texte {
					let texte = texte.to_lowercase();
					let dans_numero = d.numero.to_lowercase().contains(&texte);
					let dans_client = d.client_nom.to_lowercase().contains(&texte);
					let dans_objet = d
						.objet
						.as_ref()
						.is_some_and(|o| o.to_lowercase().contains(&texte));
					if !dans_numero && !dans_client && !dans_objet {
						return false;
					}
				}
				true
			})
			.cloned()
			.collect();
		resultats.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
		Ok(resultats)
	}

	async fn find_all_in_range(
		&self,
		debut: NaiveDate,
		fin: NaiveDate,
	) -> Result<Vec<Devis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.filter(|d| d.deleted_at.is_none())
			.filter(|d| {
				d.date_creation
					.is_some_and(|dc| dc >= debut && dc <= fin)
			})
			.cloned()
			.collect())
	}

	async fn find_versions(&self, devis_id: i64) -> Result<Vec<Devis>, StorageError> {
		let rows = self.rows.read().await;
		let devis = rows
			.get(&devis_id)
			.filter(|d| d.deleted_at.is_none())
			.ok_or(StorageError::NotFound)?;
		let racine = Self::famille_racine(devis);
		let mut famille: Vec<Devis> = rows
			.values()
			.filter(|d| d.deleted_at.is_none())
			.filter(|d| d.id == Some(racine) || d.devis_parent_id == Some(racine))
			.cloned()
			.collect();
		famille.sort_by_key(|d| d.numero_version);
		Ok(famille)
	}

	async fn get_next_version_number(&self, parent_id: i64) -> Result<i32, StorageError> {
		let rows = self.rows.read().await;
		let max_version = rows
			.values()
			.filter(|d| d.id == Some(parent_id) || d.devis_parent_id == Some(parent_id))
			.map(|d| d.numero_version)
			.max()
			.unwrap_or(0);
		Ok(max_version + 1)
	}

	async fn generate_numero(&self, annee: i32) -> Result<String, StorageError> {
		let rows = self.rows.read().await;
		let prefixe = format!("DEV-{}-", annee);
		let max_seq = rows
			.values()
			.filter_map(|d| d.numero.strip_prefix(&prefixe))
			.filter_map(|suite| suite.split('-').next())
			.filter_map(|seq| seq.parse::<u32>().ok())
			.max()
			.unwrap_or(0);
		Ok(format!("DEV-{}-{:03}", annee, max_seq + 1))
	}

	async fn count(&self) -> Result<usize, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.values().filter(|d| d.deleted_at.is_none()).count())
	}

	async fn count_by_statut(&self) -> Result<HashMap<StatutDevis, u32>, StorageError> {
		let rows = self.rows.read().await;
		let mut counts = HashMap::new();
		for devis in rows.values().filter(|d| d.deleted_at.is_none()) {
			*counts.entry(devis.statut).or_insert(0) += 1;
		}
		Ok(counts)
	}

	async fn somme_montant_by_statut(
		&self,
	) -> Result<HashMap<StatutDevis, Decimal>, StorageError> {
		let rows = self.rows.read().await;
		let mut sommes = HashMap::new();
		for devis in rows.values().filter(|d| d.deleted_at.is_none()) {
			*sommes.entry(devis.statut).or_insert(Decimal::ZERO) += devis.montant_total_ht;
		}
		Ok(sommes)
	}

	async fn find_expires(&self, aujourd_hui: NaiveDate) -> Result<Vec<Devis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.filter(|d| d.deleted_at.is_none())
			.filter(|d| matches!(d.statut, StatutDevis::Envoye | StatutDevis::Vu))
			.filter(|d| d.date_validite.is_some_and(|v| v < aujourd_hui))
			.cloned()
			.collect())
	}
}

/// In-memory lot repository.
#[derive(Default)]
pub struct MemoryLotDevisRepository {
	rows: RwLock<HashMap<i64, LotDevis>>,
	next_id: AtomicI64,
}

impl MemoryLotDevisRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl LotDevisRepository for MemoryLotDevisRepository {
	async fn save(&self, mut lot: LotDevis) -> Result<LotDevis, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match lot.id {
			None => {
				lot.id = Some(next(&self.next_id));
				lot.created_at.get_or_insert(now);
				lot.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				lot.updated_at = Some(now);
			}
		}
		rows.insert(lot.id.unwrap(), lot.clone());
		Ok(lot)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<LotDevis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).filter(|l| l.deleted_at.is_none()).cloned())
	}

	async fn find_by_devis(&self, devis_id: i64) -> Result<Vec<LotDevis>, StorageError> {
		let rows = self.rows.read().await;
		let mut lots: Vec<LotDevis> = rows
			.values()
			.filter(|l| l.devis_id == devis_id && l.deleted_at.is_none())
			.cloned()
			.collect();
		lots.sort_by_key(|l| (l.ordre, l.id));
		Ok(lots)
	}

	async fn count_by_devis(&self, devis_id: i64) -> Result<usize, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.filter(|l| l.devis_id == devis_id && l.deleted_at.is_none())
			.count())
	}

	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError> {
		let mut rows = self.rows.write().await;
		let lot = rows.get_mut(&id).ok_or(StorageError::NotFound)?;
		lot.supprimer(deleted_by);
		Ok(())
	}
}

/// In-memory line repository.
#[derive(Default)]
pub struct MemoryLigneDevisRepository {
	rows: RwLock<HashMap<i64, LigneDevis>>,
	next_id: AtomicI64,
}

impl MemoryLigneDevisRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl LigneDevisRepository for MemoryLigneDevisRepository {
	async fn save(&self, mut ligne: LigneDevis) -> Result<LigneDevis, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match ligne.id {
			None => {
				ligne.id = Some(next(&self.next_id));
				ligne.created_at.get_or_insert(now);
				ligne.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				ligne.updated_at = Some(now);
			}
		}
		rows.insert(ligne.id.unwrap(), ligne.clone());
		Ok(ligne)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<LigneDevis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).filter(|l| l.deleted_at.is_none()).cloned())
	}

	async fn find_by_lot(&self, lot_devis_id: i64) -> Result<Vec<LigneDevis>, StorageError> {
		let rows = self.rows.read().await;
		let mut lignes: Vec<LigneDevis> = rows
			.values()
			.filter(|l| l.lot_devis_id == lot_devis_id && l.deleted_at.is_none())
			.cloned()
			.collect();
		lignes.sort_by_key(|l| (l.ordre, l.id));
		Ok(lignes)
	}

	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError> {
		let mut rows = self.rows.write().await;
		let ligne = rows.get_mut(&id).ok_or(StorageError::NotFound)?;
		ligne.supprimer(deleted_by);
		Ok(())
	}
}

/// In-memory discharge-detail repository.
#[derive(Default)]
pub struct MemoryDebourseDetailRepository {
	rows: RwLock<HashMap<i64, DebourseDetail>>,
	next_id: AtomicI64,
}

impl MemoryDebourseDetailRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl DebourseDetailRepository for MemoryDebourseDetailRepository {
	async fn save(&self, mut detail: DebourseDetail) -> Result<DebourseDetail, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match detail.id {
			None => {
				detail.id = Some(next(&self.next_id));
				detail.created_at.get_or_insert(now);
				detail.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				detail.updated_at = Some(now);
			}
		}
		detail.total = detail.montant_calcule();
		rows.insert(detail.id.unwrap(), detail.clone());
		Ok(detail)
	}

	async fn find_by_ligne(
		&self,
		ligne_devis_id: i64,
	) -> Result<Vec<DebourseDetail>, StorageError> {
		let rows = self.rows.read().await;
		let mut details: Vec<DebourseDetail> = rows
			.values()
			.filter(|d| d.ligne_devis_id == ligne_devis_id)
			.cloned()
			.collect();
		details.sort_by_key(|d| d.id);
		Ok(details)
	}

	async fn replace_for_ligne(
		&self,
		ligne_devis_id: i64,
		details: Vec<DebourseDetail>,
	) -> Result<Vec<DebourseDetail>, StorageError> {
		let mut rows = self.rows.write().await;
		rows.retain(|_, d| d.ligne_devis_id != ligne_devis_id);
		let now = Utc::now();
		let mut inseres = Vec::with_capacity(details.len());
		for mut detail in details {
			detail.id = Some(next(&self.next_id));
			detail.ligne_devis_id = ligne_devis_id;
			detail.total = detail.montant_calcule();
			detail.created_at.get_or_insert(now);
			detail.updated_at = Some(now);
			rows.insert(detail.id.unwrap(), detail.clone());
			inseres.push(detail);
		}
		Ok(inseres)
	}

	async fn delete_by_ligne(&self, ligne_devis_id: i64) -> Result<(), StorageError> {
		let mut rows = self.rows.write().await;
		rows.retain(|_, d| d.ligne_devis_id != ligne_devis_id);
		Ok(())
	}
}

/// In-memory article repository.
#[derive(Default)]
pub struct MemoryArticleRepository {
	rows: RwLock<HashMap<i64, Article>>,
	next_id: AtomicI64,
}

impl MemoryArticleRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl ArticleRepository for MemoryArticleRepository {
	async fn save(&self, mut article: Article) -> Result<Article, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match article.id {
			None => {
				if rows
					.values()
					.any(|a| a.code == article.code && a.deleted_at.is_none())
				{
					return Err(StorageError::Conflict(format!(
						"code article {} deja utilise",
						article.code
					)));
				}
				article.id = Some(next(&self.next_id));
				article.created_at.get_or_insert(now);
				article.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				article.updated_at = Some(now);
			}
		}
		rows.insert(article.id.unwrap(), article.clone());
		Ok(article)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<Article>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).filter(|a| a.deleted_at.is_none()).cloned())
	}

	async fn find_by_code(&self, code: &str) -> Result<Option<Article>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.find(|a| a.code == code && a.deleted_at.is_none())
			.cloned())
	}

	async fn find_all(&self, actifs_seulement: bool) -> Result<Vec<Article>, StorageError> {
		let rows = self.rows.read().await;
		let mut articles: Vec<Article> = rows
			.values()
			.filter(|a| a.deleted_at.is_none())
			.filter(|a| !actifs_seulement || a.actif)
			.cloned()
			.collect();
		articles.sort_by(|a, b| a.code.cmp(&b.code));
		Ok(articles)
	}

	async fn count(&self) -> Result<usize, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.values().filter(|a| a.deleted_at.is_none()).count())
	}

	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError> {
		let mut rows = self.rows.write().await;
		let article = rows.get_mut(&id).ok_or(StorageError::NotFound)?;
		article.supprimer(deleted_by);
		Ok(())
	}
}

/// In-memory append-only journal repository.
#[derive(Default)]
pub struct MemoryJournalDevisRepository {
	rows: RwLock<Vec<JournalDevis>>,
	next_id: AtomicI64,
}

impl MemoryJournalDevisRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl JournalDevisRepository for MemoryJournalDevisRepository {
	async fn save(&self, mut entree: JournalDevis) -> Result<JournalDevis, StorageError> {
		let mut rows = self.rows.write().await;
		entree.id = Some(next(&self.next_id));
		entree.created_at.get_or_insert(Utc::now());
		rows.push(entree.clone());
		Ok(entree)
	}

	async fn find_by_devis(&self, devis_id: i64) -> Result<Vec<JournalDevis>, StorageError> {
		let rows = self.rows.read().await;
		// Vec preserves insertion order per quote
		Ok(rows
			.iter()
			.filter(|e| e.devis_id == devis_id)
			.cloned()
			.collect())
	}
}

/// In-memory attestation repository.
#[derive(Default)]
pub struct MemoryAttestationTvaRepository {
	rows: RwLock<HashMap<i64, AttestationTva>>,
	next_id: AtomicI64,
}

impl MemoryAttestationTvaRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl AttestationTvaRepository for MemoryAttestationTvaRepository {
	async fn save(&self, mut attestation: AttestationTva) -> Result<AttestationTva, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match attestation.id {
			None => {
				attestation.id = Some(next(&self.next_id));
				attestation.created_at.get_or_insert(now);
				attestation.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				attestation.updated_at = Some(now);
			}
		}
		rows.insert(attestation.id.unwrap(), attestation.clone());
		Ok(attestation)
	}

	async fn find_by_devis(
		&self,
		devis_id: i64,
	) -> Result<Option<AttestationTva>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.values().find(|a| a.devis_id == devis_id).cloned())
	}
}

/// In-memory signature repository.
#[derive(Default)]
pub struct MemorySignatureDevisRepository {
	rows: RwLock<HashMap<i64, SignatureDevis>>,
	next_id: AtomicI64,
}

impl MemorySignatureDevisRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl SignatureDevisRepository for MemorySignatureDevisRepository {
	async fn save(&self, mut signature: SignatureDevis) -> Result<SignatureDevis, StorageError> {
		let mut rows = self.rows.write().await;
		match signature.id {
			None => {
				signature.id = Some(next(&self.next_id));
				signature.created_at.get_or_insert(Utc::now());
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
			}
		}
		rows.insert(signature.id.unwrap(), signature.clone());
		Ok(signature)
	}

	async fn find_by_devis(
		&self,
		devis_id: i64,
	) -> Result<Option<SignatureDevis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.values().find(|s| s.devis_id == devis_id).cloned())
	}
}

/// In-memory relance repository.
#[derive(Default)]
pub struct MemoryRelanceDevisRepository {
	rows: RwLock<HashMap<i64, RelanceDevis>>,
	next_id: AtomicI64,
}

impl MemoryRelanceDevisRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl RelanceDevisRepository for MemoryRelanceDevisRepository {
	async fn save(&self, mut relance: RelanceDevis) -> Result<RelanceDevis, StorageError> {
		let mut rows = self.rows.write().await;
		match relance.id {
			None => {
				relance.id = Some(next(&self.next_id));
				relance.created_at.get_or_insert(Utc::now());
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
			}
		}
		rows.insert(relance.id.unwrap(), relance.clone());
		Ok(relance)
	}

	async fn save_batch(
		&self,
		relances: Vec<RelanceDevis>,
	) -> Result<Vec<RelanceDevis>, StorageError> {
		let mut sauvees = Vec::with_capacity(relances.len());
		for relance in relances {
			sauvees.push(self.save(relance).await?);
		}
		Ok(sauvees)
	}

	async fn find_by_devis(&self, devis_id: i64) -> Result<Vec<RelanceDevis>, StorageError> {
		let rows = self.rows.read().await;
		let mut relances: Vec<RelanceDevis> = rows
			.values()
			.filter(|r| r.devis_id == devis_id)
			.cloned()
			.collect();
		relances.sort_by_key(|r| r.numero_relance);
		Ok(relances)
	}

	async fn find_planifiees_by_devis(
		&self,
		devis_id: i64,
	) -> Result<Vec<RelanceDevis>, StorageError> {
		let relances = self.find_by_devis(devis_id).await?;
		Ok(relances.into_iter().filter(|r| r.est_planifiee()).collect())
	}

	async fn find_planifiees_avant(
		&self,
		date: DateTime<Utc>,
	) -> Result<Vec<RelanceDevis>, StorageError> {
		let rows = self.rows.read().await;
		let mut relances: Vec<RelanceDevis> = rows
			.values()
			.filter(|r| r.est_planifiee() && r.date_prevue <= date)
			.cloned()
			.collect();
		relances.sort_by_key(|r| (r.devis_id, r.numero_relance));
		Ok(relances)
	}
}

/// In-memory site-expense repository.
#[derive(Default)]
pub struct MemoryFraisChantierRepository {
	rows: RwLock<HashMap<i64, FraisChantierDevis>>,
	next_id: AtomicI64,
}

impl MemoryFraisChantierRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl FraisChantierRepository for MemoryFraisChantierRepository {
	async fn save(
		&self,
		mut frais: FraisChantierDevis,
	) -> Result<FraisChantierDevis, StorageError> {
		let mut rows = self.rows.write().await;
		let now = Utc::now();
		match frais.id {
			None => {
				frais.id = Some(next(&self.next_id));
				frais.created_at.get_or_insert(now);
				frais.updated_at = Some(now);
			}
			Some(id) => {
				if !rows.contains_key(&id) {
					return Err(StorageError::NotFound);
				}
				frais.updated_at = Some(now);
			}
		}
		rows.insert(frais.id.unwrap(), frais.clone());
		Ok(frais)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<FraisChantierDevis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).filter(|f| f.deleted_at.is_none()).cloned())
	}

	async fn find_by_devis(
		&self,
		devis_id: i64,
	) -> Result<Vec<FraisChantierDevis>, StorageError> {
		let rows = self.rows.read().await;
		let mut frais: Vec<FraisChantierDevis> = rows
			.values()
			.filter(|f| f.devis_id == devis_id && f.deleted_at.is_none())
			.cloned()
			.collect();
		frais.sort_by_key(|f| (f.ordre, f.id));
		Ok(frais)
	}

	async fn delete(&self, id: i64, deleted_by: i64) -> Result<(), StorageError> {
		let mut rows = self.rows.write().await;
		let frais = rows.get_mut(&id).ok_or(StorageError::NotFound)?;
		frais.supprimer(deleted_by);
		Ok(())
	}
}

/// In-memory comparison repository.
#[derive(Default)]
pub struct MemoryComparatifRepository {
	rows: RwLock<HashMap<i64, ComparatifDevis>>,
	next_id: AtomicI64,
}

impl MemoryComparatifRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl ComparatifRepository for MemoryComparatifRepository {
	async fn save(&self, mut comparatif: ComparatifDevis) -> Result<ComparatifDevis, StorageError> {
		let mut rows = self.rows.write().await;
		// The latest generation supersedes any earlier record for the pair
		rows.retain(|_, c| {
			!(c.devis_source_id == comparatif.devis_source_id
				&& c.devis_cible_id == comparatif.devis_cible_id)
		});
		let id = comparatif.id.unwrap_or_else(|| next(&self.next_id));
		comparatif.id = Some(id);
		comparatif.created_at.get_or_insert(Utc::now());
		for ligne in &mut comparatif.lignes {
			ligne.comparatif_id = id;
		}
		rows.insert(id, comparatif.clone());
		Ok(comparatif)
	}

	async fn find_by_id(&self, id: i64) -> Result<Option<ComparatifDevis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(&id).cloned())
	}

	async fn find_by_pair(
		&self,
		devis_source_id: i64,
		devis_cible_id: i64,
	) -> Result<Option<ComparatifDevis>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.find(|c| {
				c.devis_source_id == devis_source_id && c.devis_cible_id == devis_cible_id
			})
			.cloned())
	}
}

/// Bundle of every in-memory repository, ready to wire into use cases.
#[derive(Default)]
pub struct MemoryStores {
	pub devis: Arc<MemoryDevisRepository>,
	pub lots: Arc<MemoryLotDevisRepository>,
	pub lignes: Arc<MemoryLigneDevisRepository>,
	pub debourses: Arc<MemoryDebourseDetailRepository>,
	pub articles: Arc<MemoryArticleRepository>,
	pub journal: Arc<MemoryJournalDevisRepository>,
	pub attestations: Arc<MemoryAttestationTvaRepository>,
	pub signatures: Arc<MemorySignatureDevisRepository>,
	pub relances: Arc<MemoryRelanceDevisRepository>,
	pub frais: Arc<MemoryFraisChantierRepository>,
	pub comparatifs: Arc<MemoryComparatifRepository>,
}

impl MemoryStores {
	pub fn new() -> Self {
		Self::default()
	}
}
