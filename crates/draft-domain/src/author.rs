// author.rs
use crate::DomainError;
use draft::{EntityKey, Identifiable, OwnerRef};
use serde::{Deserialize, Serialize};

/// Autor de borradores. Sólo participa como propietario.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
  id: String,
  name: String,
}

impl Author {
  pub fn new(id: &str, name: &str) -> Result<Self, DomainError> {
    if id.trim().is_empty() {
      return Err(DomainError::ValidationError("id de autor no puede estar vacío".to_string()));
    }
    Ok(Self { id: id.trim().to_string(),
              name: name.to_string() })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Referencia de propietario `("author", id)`.
  pub fn as_owner(&self) -> OwnerRef {
    OwnerRef::typed(Self::type_key(), self.id.clone())
  }
}

impl Identifiable for Author {
  fn type_key() -> &'static str {
    "author"
  }

  fn entity_key(&self) -> Option<EntityKey> {
    Some(self.id.clone())
  }
}
