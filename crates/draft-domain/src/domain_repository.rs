use crate::{Article, DomainError};
use draft::{DraftError, EntityKey, EntityRecord, EntityRepository, Payload};
use indexmap::IndexMap;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Implementación en memoria para tests y desarrollo.
///
/// Cada escritura pasa por `Article::from_payload`, así que un payload con
/// título vacío se rechaza igual que en una tabla real con restricciones.
pub struct InMemoryArticleRepository {
  articles: Arc<Mutex<IndexMap<String, Article>>>,
  next_id: AtomicU64,
}

impl InMemoryArticleRepository {
  pub fn new() -> Self {
    Self { articles: Arc::new(Mutex::new(IndexMap::new())),
           next_id: AtomicU64::new(1) }
  }

  // Helper to map poisoned mutex errors into DomainError
  fn lock_map(&self) -> Result<std::sync::MutexGuard<'_, IndexMap<String, Article>>, DomainError> {
    self.articles
        .lock()
        .map_err(|e| DomainError::ExternalError(format!("Mutex 'articles' poisoned: {}", e)))
  }

  pub fn get_article(&self, id: &str) -> Result<Option<Article>, DomainError> {
    Ok(self.lock_map()?.get(id).cloned())
  }

  /// Lista todos los artículos en orden de creación (útil para pruebas).
  pub fn list_articles(&self) -> Result<Vec<Article>, DomainError> {
    Ok(self.lock_map()?.values().cloned().collect())
  }

  pub fn count(&self) -> Result<usize, DomainError> {
    Ok(self.lock_map()?.len())
  }
}

impl Default for InMemoryArticleRepository {
  fn default() -> Self {
    Self::new()
  }
}

fn to_record(article: &Article) -> Result<EntityRecord, DraftError> {
  let id = article.id()
                  .ok_or_else(|| DraftError::Persistence("artículo sin id tras guardar".into()))?
                  .to_string();
  Ok(EntityRecord { fields: draft::DraftableEntity::to_payload(article)?,
                    id })
}

impl EntityRepository for InMemoryArticleRepository {
  fn create_from(&self, payload: &Payload) -> Result<EntityRecord, DraftError> {
    let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
    let article = Article::from_payload(Some(id.clone()), payload)?;
    self.lock_map()?.insert(id.clone(), article.clone());
    debug!("article {} creado", id);
    to_record(&article)
  }

  fn update_from(&self, id: &EntityKey, payload: &Payload) -> Result<EntityRecord, DraftError> {
    let mut articles = self.lock_map()?;
    let current = articles.get(id)
                          .ok_or_else(|| DraftError::NotFound(format!("article {}", id)))?;
    // los campos ausentes conservan su valor actual
    let mut merged = draft::DraftableEntity::to_payload(current)?;
    for (k, v) in payload {
      merged.insert(k.clone(), v.clone());
    }
    let article = Article::from_payload(Some(id.clone()), &merged)?;
    articles.insert(id.clone(), article.clone());
    debug!("article {} actualizado", id);
    to_record(&article)
  }

  fn find_by_id(&self, id: &EntityKey) -> Result<Option<EntityRecord>, DraftError> {
    match self.get_article(id)? {
      Some(a) => Ok(Some(to_record(&a)?)),
      None => Ok(None),
    }
  }
}
