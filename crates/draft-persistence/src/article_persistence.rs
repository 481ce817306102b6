use crate::draft_persistence::{DbConn, DbPool};
use crate::schema;
use crate::schema::articles::dsl as articles_dsl;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use draft::{DraftError, DraftableEntity, EntityKey, EntityRecord, EntityRepository, Payload};
use draft_domain::Article;
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

/// Repo Diesel de artículos. Registra bajo `"article"` en el
/// `EntityRegistry` y valida cada escritura con `Article::from_payload`.
pub struct DieselArticleRepository {
  pool: Arc<DbPool>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::articles)]
struct ArticleRow {
  pub id: String,
  pub title: String,
  pub body: String,
  pub created_at_ts: i64,
}

impl DieselArticleRepository {
  pub fn new(pool: Arc<DbPool>) -> Self {
    Self { pool }
  }
  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, DraftError> {
    self.pool.get().map_err(|e| DraftError::Persistence(format!("pool: {}", e)))
  }

  pub fn get_article(&self, article_id: &str) -> Result<Option<Article>, DraftError> {
    let mut conn = self.conn()?;
    let row = articles_dsl::articles.filter(articles_dsl::id.eq(article_id))
                                    .first::<ArticleRow>(&mut conn)
                                    .optional()
                                    .map_err(|e| DraftError::Persistence(format!("db: {}", e)))?;
    row.map(row_to_article).transpose()
  }

  /// Lista los artículos en orden de creación.
  pub fn list_articles(&self) -> Result<Vec<Article>, DraftError> {
    let mut conn = self.conn()?;
    let rows = articles_dsl::articles.order((articles_dsl::created_at_ts.asc(), articles_dsl::id.asc()))
                                     .load::<ArticleRow>(&mut conn)
                                     .map_err(|e| DraftError::Persistence(format!("db: {}", e)))?;
    rows.into_iter().map(row_to_article).collect()
  }

  pub fn count(&self) -> Result<i64, DraftError> {
    let mut conn = self.conn()?;
    articles_dsl::articles.count()
                          .get_result(&mut conn)
                          .map_err(|e| DraftError::Persistence(format!("db: {}", e)))
  }
}

fn row_to_article(r: ArticleRow) -> Result<Article, DraftError> {
  let mut payload = Payload::new();
  payload.insert("title".into(), serde_json::Value::String(r.title));
  payload.insert("body".into(), serde_json::Value::String(r.body));
  // lo guardado ya pasó validación; se reconstruye sin volver a validar
  Article::default().force_populate(Some(r.id), &payload)
}

fn to_record(article: &Article) -> Result<EntityRecord, DraftError> {
  let key = article.id()
                   .ok_or_else(|| DraftError::Persistence("artículo sin id tras guardar".into()))?
                   .to_string();
  Ok(EntityRecord { id: key,
                    fields: article.to_payload()? })
}

impl EntityRepository for DieselArticleRepository {
  fn create_from(&self, payload: &Payload) -> Result<EntityRecord, DraftError> {
    let new_id = Uuid::new_v4().to_string();
    let article = Article::from_payload(Some(new_id.clone()), payload)?;
    let row = ArticleRow { id: new_id.clone(),
                           title: article.title().to_string(),
                           body: article.body().to_string(),
                           created_at_ts: Utc::now().timestamp_micros() };
    let mut conn = self.conn()?;
    diesel::insert_into(articles_dsl::articles).values(&row)
                                               .execute(&mut conn)
                                               .map_err(|e| DraftError::Persistence(format!("db: {}", e)))?;
    debug!("articles: insert {}", new_id);
    to_record(&article)
  }

  fn update_from(&self, key: &EntityKey, payload: &Payload) -> Result<EntityRecord, DraftError> {
    let current = self.get_article(key)?
                      .ok_or_else(|| DraftError::NotFound(format!("article {}", key)))?;
    let mut merged = current.to_payload()?;
    for (k, v) in payload {
      merged.insert(k.clone(), v.clone());
    }
    let article = Article::from_payload(Some(key.clone()), &merged)?;
    let mut conn = self.conn()?;
    diesel::update(articles_dsl::articles.filter(articles_dsl::id.eq(key))).set((articles_dsl::title.eq(article.title()),
                                                                                 articles_dsl::body.eq(article.body())))
                                                                           .execute(&mut conn)
                                                                           .map_err(|e| DraftError::Persistence(format!("db: {}", e)))?;
    debug!("articles: update {}", key);
    to_record(&article)
  }

  fn find_by_id(&self, key: &EntityKey) -> Result<Option<EntityRecord>, DraftError> {
    match self.get_article(key)? {
      Some(a) => Ok(Some(to_record(&a)?)),
      None => Ok(None),
    }
  }
}
