// errors.rs
use draft::DraftError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
  #[error("Error de validación: {0}")]
  ValidationError(String),
  #[error("Error externo: {0}")]
  ExternalError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}

/// Un rechazo del dominio llega al motor como fallo del colaborador de
/// persistencia; `publish` lo envuelve después en `DraftError::Publish`.
impl From<DomainError> for DraftError {
  fn from(e: DomainError) -> Self {
    match e {
      DomainError::SerializationError(msg) => DraftError::Serialization(msg),
      other => DraftError::Persistence(other.to_string()),
    }
  }
}

impl From<DraftError> for DomainError {
  fn from(e: DraftError) -> Self {
    match e {
      DraftError::Serialization(msg) => DomainError::SerializationError(msg),
      other => DomainError::ExternalError(other.to_string()),
    }
  }
}
