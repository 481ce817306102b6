// Archivo: errors.rs
// Propósito: definir los errores del crate de borradores y el alias Result<T>
// usado por todas sus APIs.
use thiserror::Error;
use uuid::Uuid;

/// Fallos específicos de la transición `restore`.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// No existe una entidad viva de `entity_type` con ese id.
    #[error("No se encontró la entidad {entity_type} con id {entity_id}")]
    EntityNotFound { entity_type: String, entity_id: String },
    /// El borrador nunca fue publicado ni tomado de una entidad existente.
    #[error("El borrador {draft_id} no tiene entity_id; no hay entidad que restaurar")]
    MissingEntityId { draft_id: Uuid },
}

/// Errores comunes del dominio de borradores.
///
/// - `Persistence`: fallo del almacenamiento subyacente (lectura o escritura).
/// - `Publish`: la creación de la entidad durante `publish` falló.
/// - `Restore`: la restauración no encontró su entidad destino.
/// - `NoDraftAssociated`: `publish` sobre una entidad sin borrador.
/// - `NotFound`: la búsqueda por id o scope no encontró nada.
#[derive(Error, Debug)]
pub enum DraftError {
    /// Error del colaborador de persistencia (violación de restricción,
    /// conexión, mutex envenenado, etc.).
    #[error("Error de persistencia: {0}")]
    Persistence(String),
    /// La entidad no pudo crearse a partir del payload del borrador. El
    /// borrador queda sin cambios.
    #[error("Error al publicar el borrador {draft_id}: {cause}")]
    Publish {
        draft_id: Uuid,
        #[source]
        cause: Box<DraftError>,
    },
    #[error("Error al restaurar: {0}")]
    Restore(#[from] RestoreError),
    #[error("La entidad no tiene un borrador asociado")]
    NoDraftAssociated,
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// No hay repositorio registrado para ese tipo de entidad.
    #[error("Tipo de entidad no registrado: {0}")]
    UnknownEntityType(String),
    #[error("Tipo de entidad incompatible: se esperaba {expected}, se obtuvo {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Propietario inválido: {0}")]
    InvalidOwner(String),
    #[error("Error de serialización: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DraftError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, DraftError>;
