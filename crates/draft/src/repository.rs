// Archivo: repository.rs
// Propósito: definir los contratos de persistencia: `DraftRepository` para
// los snapshots y `EntityRepository` para las entidades vivas de cada tipo.
// También define `DraftFilter`, los predicados que toda implementación debe
// saber aplicar.
use crate::domain::{EntityKey, EntityRecord, OwnerPolicy, OwnerRef, Payload, SnapshotRecord};
use crate::errors::Result;
use uuid::Uuid;

/// Filtro sobre `published_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishState {
    #[default]
    Any,
    /// `published_at IS NOT NULL`
    Published,
    /// `published_at IS NULL`
    Unpublished,
}

/// Filtro por propietario, ya resuelto según la `OwnerPolicy` activa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerFilter {
    /// `owner_type = ? AND owner_id = ?` (`owner_type IS NULL` si es `None`).
    Pair { owner_type: Option<String>, owner_id: String },
    /// `owner_id = ?`
    IdOnly(String),
}

impl OwnerFilter {
    pub fn from_owner(owner: &OwnerRef, policy: OwnerPolicy) -> Self {
        match policy {
            OwnerPolicy::TypedPair => OwnerFilter::Pair { owner_type: owner.owner_type.clone(),
                                                          owner_id: owner.owner_id.clone() },
            OwnerPolicy::IdOnly => OwnerFilter::IdOnly(owner.owner_id.clone()),
        }
    }

    pub fn matches(&self, record: &SnapshotRecord) -> bool {
        match self {
            OwnerFilter::Pair { owner_type, owner_id } => {
                record.owner_type == *owner_type && record.owner_id.as_deref() == Some(owner_id.as_str())
            }
            OwnerFilter::IdOnly(owner_id) => record.owner_id.as_deref() == Some(owner_id.as_str()),
        }
    }
}

/// Conjunción de predicados sobre `draftables`. Un campo en `None` no filtra.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftFilter {
    pub id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<EntityKey>,
    pub owner: Option<OwnerFilter>,
    pub state: PublishState,
}

impl DraftFilter {
    /// Filtro base: todos los borradores de un tipo de entidad.
    pub fn for_type(entity_type: impl Into<String>) -> Self {
        Self { entity_type: Some(entity_type.into()),
               ..Default::default() }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<EntityKey>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_owner(mut self, owner: OwnerFilter) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_state(mut self, state: PublishState) -> Self {
        self.state = state;
        self
    }

    /// Evalúa el filtro en memoria. Las implementaciones SQL traducen los
    /// mismos predicados a su dialecto.
    pub fn matches(&self, record: &SnapshotRecord) -> bool {
        if let Some(id) = &self.id {
            if record.id != *id {
                return false;
            }
        }
        if let Some(t) = &self.entity_type {
            if record.entity_type != *t {
                return false;
            }
        }
        if let Some(eid) = &self.entity_id {
            if record.entity_id.as_ref() != Some(eid) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if !owner.matches(record) {
                return false;
            }
        }
        match self.state {
            PublishState::Any => true,
            PublishState::Published => record.is_published(),
            PublishState::Unpublished => record.is_unpublished(),
        }
    }
}

/// Contrato del colaborador de persistencia de snapshots.
///
/// Cada operación es una única escritura o lectura; el repositorio no ofrece
/// transacciones entre llamadas.
pub trait DraftRepository: Send + Sync {
    /// Inserta un registro nuevo. Falla con `Persistence` si el id ya existe
    /// o el almacenamiento rechaza la escritura.
    fn insert_draft(&self, record: &SnapshotRecord) -> Result<SnapshotRecord>;

    /// Obtiene un registro por id; `NotFound` si no existe.
    fn get_draft(&self, id: &Uuid) -> Result<SnapshotRecord>;

    /// Devuelve los registros que cumplen `filter`, en orden de creación.
    fn find_drafts(&self, filter: &DraftFilter) -> Result<Vec<SnapshotRecord>>;

    /// Sobrescribe un registro existente; `NotFound` si no existe.
    fn update_draft(&self, record: &SnapshotRecord) -> Result<SnapshotRecord>;

    /// Elimina un registro. No forma parte de la máquina de estados.
    fn delete_draft(&self, id: &Uuid) -> Result<()>;
}

/// Colaborador de persistencia de entidades vivas para un tipo concreto.
///
/// Trabaja sobre `Payload` para poder registrarse como objeto dinámico en el
/// `EntityRegistry`; las conversiones tipadas viven en `DraftableEntity`.
pub trait EntityRepository: Send + Sync {
    /// Crea una entidad nueva con identidad fresca a partir de `payload`.
    fn create_from(&self, payload: &Payload) -> Result<EntityRecord>;

    /// Actualiza los campos de una entidad existente (no crea identidad).
    fn update_from(&self, id: &EntityKey, payload: &Payload) -> Result<EntityRecord>;

    /// Busca una entidad por clave.
    fn find_by_id(&self, id: &EntityKey) -> Result<Option<EntityRecord>>;
}
