// article.rs
use crate::DomainError;
use draft::{deserialize_payload, serialize_payload, DraftableEntity, EntityKey, Identifiable, Payload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Artículo publicable. La clave primaria no forma parte del payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
  #[serde(skip)]
  id: Option<String>,
  title: String,
  body: String,
}

impl Article {
  /// Crea un artículo sin persistir. El título es obligatorio.
  pub fn new(title: &str, body: &str) -> Result<Self, DomainError> {
    let article = Self { id: None,
                         title: title.trim().to_string(),
                         body: body.to_string() };
    article.validate()?;
    Ok(article)
  }

  /// Reconstruye un artículo desde su payload aplicando las validaciones
  /// normales. Es el camino de escritura de los repositorios.
  pub fn from_payload(id: Option<String>, payload: &Payload) -> Result<Self, DomainError> {
    let mut article: Article = deserialize_payload(payload)?;
    article.id = id;
    article.validate()?;
    Ok(article)
  }

  pub fn validate(&self) -> Result<(), DomainError> {
    if self.title.trim().is_empty() {
      return Err(DomainError::ValidationError("title no puede estar vacío".to_string()));
    }
    Ok(())
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn body(&self) -> &str {
    &self.body
  }

  pub fn set_title(&mut self, title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
      return Err(DomainError::ValidationError("title no puede estar vacío".to_string()));
    }
    self.title = title.trim().to_string();
    Ok(())
  }

  pub fn set_body(&mut self, body: &str) {
    self.body = body.to_string();
  }

  /// Copia con clave asignada (la usa el repositorio al persistir).
  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }
}

impl Identifiable for Article {
  fn type_key() -> &'static str {
    "article"
  }

  fn entity_key(&self) -> Option<EntityKey> {
    self.id.clone()
  }
}

impl DraftableEntity for Article {
  fn to_payload(&self) -> draft::Result<Payload> {
    serialize_payload(self, "id")
  }

  // Sin validar: el payload de un borrador puede estar incompleto.
  fn force_populate(self, key: Option<EntityKey>, payload: &Payload) -> draft::Result<Self> {
    let mut article: Article = deserialize_payload(payload)?;
    article.id = key.or(self.id);
    Ok(article)
  }
}

impl fmt::Display for Article {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f,
           "Article(id: {}, title: {})",
           self.id.as_deref().unwrap_or("-"),
           self.title)
  }
}
