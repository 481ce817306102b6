// Archivo: domain.rs
// Propósito: tipos de datos del crate. `SnapshotRecord` es la fila persistida
// de un borrador; `OwnerRef` y `OwnerPolicy` modelan la atribución.
use crate::entity::Identifiable;
use crate::errors::{DraftError, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Estado serializado de una entidad: nombre de campo -> valor, en orden.
pub type Payload = IndexMap<String, JsonValue>;

/// Anotaciones libres del borrador (revisión, comentarios, ...).
pub type Metadata = IndexMap<String, JsonValue>;

/// Clave primaria de una entidad viva, en forma textual.
pub type EntityKey = String;

/// Registro de snapshot (la fila `draftables`).
///
/// El almacén lo trata como dato opaco: sólo `publish`, `restore` y
/// `set_data` lo modifican una vez creado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    /// Clave registrada del tipo de entidad destino (p.ej. `"article"`).
    pub entity_type: String,
    /// Entidad viva que representa este snapshot. Mientras no esté publicado
    /// sólo indica la entidad original de la que se tomó el borrador.
    pub entity_id: Option<EntityKey>,
    pub payload: Payload,
    pub published_at: Option<DateTime<Utc>>,
    pub owner_type: Option<String>,
    pub owner_id: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SnapshotRecord {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn is_unpublished(&self) -> bool {
        self.published_at.is_none()
    }

    /// Propietario del borrador, si se registró alguno.
    pub fn owner(&self) -> Option<OwnerRef> {
        self.owner_id.as_ref().map(|id| OwnerRef { owner_type: self.owner_type.clone(),
                                                   owner_id: id.clone() })
    }

    /// Valor de metadata para `key`, o `None` si no existe.
    pub fn get_data(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }
}

/// Campos de entrada para crear un `SnapshotRecord`. El almacén completa
/// `id` (si no se indica) y los timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewDraft {
    pub id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Option<EntityKey>,
    pub payload: Payload,
    pub published_at: Option<DateTime<Utc>>,
    pub owner: Option<OwnerRef>,
    pub metadata: Metadata,
}

/// Referencia polimórfica al autor/propietario de un borrador: otra entidad
/// (tipo + id) o un identificador suelto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub owner_type: Option<String>,
    pub owner_id: String,
}

impl OwnerRef {
    /// Propietario identificado sólo por un id.
    pub fn id(owner_id: impl Into<String>) -> Self {
        Self { owner_type: None,
               owner_id: owner_id.into() }
    }

    pub fn typed(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self { owner_type: Some(owner_type.into()),
               owner_id: owner_id.into() }
    }

    /// Construye el propietario a partir de una entidad persistida. Falla con
    /// `InvalidOwner` si la entidad todavía no tiene clave.
    pub fn of<E: Identifiable>(entity: &E) -> Result<Self> {
        let key = entity.entity_key()
                        .ok_or_else(|| DraftError::InvalidOwner(format!("{} sin clave primaria", E::type_key())))?;
        Ok(Self::typed(E::type_key(), key))
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner_type {
            Some(t) => write!(f, "{}:{}", t, self.owner_id),
            None => write!(f, "{}", self.owner_id),
        }
    }
}

/// Política de resolución del propietario. Decide qué forma se guarda y por
/// cuál se filtra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerPolicy {
    /// `(owner_type, owner_id)`: admite varios tipos de propietario.
    #[default]
    TypedPair,
    /// Sólo `owner_id`: un único tipo implícito de propietario.
    IdOnly,
}

impl OwnerPolicy {
    /// Normaliza una referencia según la política (en `IdOnly` se descarta el
    /// tipo).
    pub fn normalize(&self, owner: OwnerRef) -> OwnerRef {
        match self {
            OwnerPolicy::TypedPair => owner,
            OwnerPolicy::IdOnly => OwnerRef::id(owner.owner_id),
        }
    }
}

impl fmt::Display for OwnerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OwnerPolicy::TypedPair => "typed_pair",
            OwnerPolicy::IdOnly => "id_only",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OwnerPolicy {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "typed_pair" | "typed" | "pair" => Ok(OwnerPolicy::TypedPair),
            "id_only" | "id" => Ok(OwnerPolicy::IdOnly),
            other => Err(DraftError::InvalidOwner(format!("política de propietario desconocida: {}", other))),
        }
    }
}

/// Entidad viva tal como la devuelve su colaborador de persistencia: clave
/// más campos (sin la clave).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityKey,
    pub fields: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_policy_parses_aliases() {
        assert_eq!("typed_pair".parse::<OwnerPolicy>().unwrap(), OwnerPolicy::TypedPair);
        assert_eq!("ID_ONLY".parse::<OwnerPolicy>().unwrap(), OwnerPolicy::IdOnly);
        assert!("nope".parse::<OwnerPolicy>().is_err());
        assert_eq!(OwnerPolicy::IdOnly.to_string(), "id_only");
    }

    #[test]
    fn id_only_policy_drops_owner_type() {
        let owner = OwnerRef::typed("author", "7");
        assert_eq!(OwnerPolicy::IdOnly.normalize(owner.clone()), OwnerRef::id("7"));
        assert_eq!(OwnerPolicy::TypedPair.normalize(owner.clone()), owner);
    }
}
