//! Price-library use cases.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

use btp_storage::ArticleRepository;
use btp_types::{Article, CategorieArticle, DevisError, UniteArticle};

/// Input of article creation.
#[derive(Debug, Clone)]
pub struct ArticleInput {
	pub code: String,
	pub libelle: String,
	pub description: Option<String>,
	pub unite: UniteArticle,
	pub prix_unitaire_ht: Decimal,
	pub categorie: CategorieArticle,
	pub composants_json: Option<serde_json::Value>,
}

/// Creates a library article.
pub struct CreateArticleUseCase {
	pub article_repo: Arc<dyn ArticleRepository>,
}

impl CreateArticleUseCase {
	#[instrument(skip_all, fields(code = %input.code))]
	pub async fn execute(&self, input: ArticleInput, created_by: i64) -> Result<Article, DevisError> {
		let mut article = Article::new(
			input.code,
			input.libelle,
			input.unite,
			input.prix_unitaire_ht,
			input.categorie,
		)?;
		article.description = input.description;
		article.composants_json = input.composants_json;
		article.created_by = Some(created_by);
		Ok(self.article_repo.save(article).await?)
	}
}

/// Updates an article's unit price, guarded against negatives.
pub struct UpdateArticlePrixUseCase {
	pub article_repo: Arc<dyn ArticleRepository>,
}

impl UpdateArticlePrixUseCase {
	#[instrument(skip_all, fields(article_id))]
	pub async fn execute(
		&self,
		article_id: i64,
		nouveau_prix: Decimal,
	) -> Result<Article, DevisError> {
		let mut article = self
			.article_repo
			.find_by_id(article_id)
			.await?
			.ok_or(DevisError::ArticleNotFound { article_id })?;
		article.mettre_a_jour_prix(nouveau_prix)?;
		Ok(self.article_repo.save(article).await?)
	}
}

/// Activates or deactivates an article.
pub struct ActiverArticleUseCase {
	pub article_repo: Arc<dyn ArticleRepository>,
}

impl ActiverArticleUseCase {
	pub async fn execute(&self, article_id: i64, actif: bool) -> Result<Article, DevisError> {
		let mut article = self
			.article_repo
			.find_by_id(article_id)
			.await?
			.ok_or(DevisError::ArticleNotFound { article_id })?;
		if actif {
			article.activer();
		} else {
			article.desactiver();
		}
		Ok(self.article_repo.save(article).await?)
	}
}

/// Soft-deletes an article. Lines keep their reference.
pub struct DeleteArticleUseCase {
	pub article_repo: Arc<dyn ArticleRepository>,
}

impl DeleteArticleUseCase {
	pub async fn execute(&self, article_id: i64, deleted_by: i64) -> Result<(), DevisError> {
		self.article_repo
			.find_by_id(article_id)
			.await?
			.ok_or(DevisError::ArticleNotFound { article_id })?;
		Ok(self.article_repo.delete(article_id, deleted_by).await?)
	}
}

/// Lists library articles.
pub struct ListArticlesUseCase {
	pub article_repo: Arc<dyn ArticleRepository>,
}

impl ListArticlesUseCase {
	pub async fn execute(&self, actifs_seulement: bool) -> Result<Vec<Article>, DevisError> {
		Ok(self.article_repo.find_all(actifs_seulement).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{dec, stores};

	fn input(code: &str) -> ArticleInput {
		ArticleInput {
			code: code.into(),
			libelle: "Beton C25/30".into(),
			description: None,
			unite: UniteArticle::M3,
			prix_unitaire_ht: dec("120"),
			categorie: CategorieArticle::GrosOeuvre,
			composants_json: None,
		}
	}

	#[tokio::test]
	async fn test_creation_et_code_unique() {
		let s = stores();
		let uc = CreateArticleUseCase {
			article_repo: s.articles.clone(),
		};
		uc.execute(input("GO-001"), 1).await.unwrap();
		// A duplicated code is a storage conflict
		let err = uc.execute(input("GO-001"), 1).await.unwrap_err();
		assert_eq!(err.kind(), "stockage");
	}

	#[tokio::test]
	async fn test_prix_garde() {
		let s = stores();
		let article = CreateArticleUseCase {
			article_repo: s.articles.clone(),
		}
		.execute(input("GO-002"), 1)
		.await
		.unwrap();

		let uc = UpdateArticlePrixUseCase {
			article_repo: s.articles.clone(),
		};
		let err = uc
			.execute(article.id.unwrap(), dec("-10"))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "devis_validation");

		let article = uc.execute(article.id.unwrap(), dec("135")).await.unwrap();
		assert_eq!(article.prix_unitaire_ht, dec("135"));
	}

	#[tokio::test]
	async fn test_desactivation_filtre_la_liste() {
		let s = stores();
		let article = CreateArticleUseCase {
			article_repo: s.articles.clone(),
		}
		.execute(input("GO-003"), 1)
		.await
		.unwrap();

		ActiverArticleUseCase {
			article_repo: s.articles.clone(),
		}
		.execute(article.id.unwrap(), false)
		.await
		.unwrap();

		let liste = ListArticlesUseCase {
			article_repo: s.articles.clone(),
		};
		assert!(liste.execute(true).await.unwrap().is_empty());
		assert_eq!(liste.execute(false).await.unwrap().len(), 1);
	}
}
