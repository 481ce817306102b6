// Archivo: entity.rs
// Propósito: traits que una entidad de dominio implementa para participar en
// el versionado por borradores, y el envoltorio `Drafted<T>` que transporta
// la referencia transitoria al borrador.
use crate::domain::{EntityKey, Payload, SnapshotRecord};
use crate::errors::{DraftError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::ops::Deref;

/// Identidad de una entidad: clave de tipo registrada + clave primaria.
pub trait Identifiable {
    /// Clave estable del tipo (se guarda en `entity_type` / `owner_type`).
    fn type_key() -> &'static str;

    /// Clave primaria, `None` si la entidad aún no se persistió.
    fn entity_key(&self) -> Option<EntityKey>;
}

/// Capacidad de borrador de una entidad de dominio.
///
/// `Default` provee la entidad "en blanco" que `force_populate` rellena al
/// materializar un snapshot.
pub trait DraftableEntity: Identifiable + Default + Clone + Send + Sync {
    /// Estado actual de la entidad como payload. Nunca incluye la clave
    /// primaria; ésta viaja en `entity_id`.
    fn to_payload(&self) -> Result<Payload>;

    /// Rellena una entidad en blanco con `payload`, sin pasar por las
    /// validaciones de asignación normales: el payload es un estado válido
    /// anterior.
    fn force_populate(self, key: Option<EntityKey>, payload: &Payload) -> Result<Self>;
}

/// Serializa `value` como payload quitando `key_field` si aparece.
pub fn serialize_payload<S: Serialize>(value: &S, key_field: &str) -> Result<Payload> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map.into_iter().filter(|(k, _)| k != key_field).collect()),
        other => Err(DraftError::Serialization(format!("se esperaba un objeto JSON, se obtuvo {}", other))),
    }
}

/// Deserializa un payload en `D` sin validaciones de dominio.
pub fn deserialize_payload<D: DeserializeOwned>(payload: &Payload) -> Result<D> {
    let object: serde_json::Map<String, JsonValue> = payload.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    Ok(serde_json::from_value(JsonValue::Object(object))?)
}

/// Entidad junto con su referencia transitoria al borrador del que proviene
/// (o que acaba de crearse). La referencia nunca se persiste.
#[derive(Debug, Clone, PartialEq)]
pub struct Drafted<T> {
    pub entity: T,
    pub published_at: Option<DateTime<Utc>>,
    pub draft: Option<SnapshotRecord>,
}

impl<T> Drafted<T> {
    /// Entidad sin borrador asociado.
    pub fn new(entity: T) -> Self {
        Self { entity,
               published_at: None,
               draft: None }
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn draft(&self) -> Option<&SnapshotRecord> {
        self.draft.as_ref()
    }

    /// Metadata del borrador asociado.
    pub fn get_data(&self, key: &str) -> Option<&JsonValue> {
        self.draft.as_ref().and_then(|d| d.get_data(key))
    }

    pub fn into_inner(self) -> T {
        self.entity
    }
}

impl<T> Deref for Drafted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}
