// Archivo: engine.rs
// Propósito: implementar el `DraftEngine`, la máquina de estados de un
// `SnapshotRecord`: crear borrador, crear con publicación inmediata,
// publicar, restaurar y materializar.
//
// Nota: publish/restore son dos escrituras independientes (entidad y luego
// snapshot) sin transacción compartida. Si la segunda falla se registra un
// `warn!` con la entidad afectada y se devuelve el error; no hay rollback.
use crate::clock::{Clock, IdGenerator, SystemClock, UuidV4Generator};
use crate::domain::{EntityKey, EntityRecord, Metadata, NewDraft, OwnerPolicy, OwnerRef, Payload, SnapshotRecord};
use crate::entity::{DraftableEntity, Drafted};
use crate::errors::{DraftError, RestoreError, Result};
use crate::registry::EntityRegistry;
use crate::repository::DraftRepository;
use crate::store::DraftStore;
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// Configuración del motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DraftEngineConfig {
    /// Forma en que se guarda y filtra el propietario.
    pub owner_policy: OwnerPolicy,
}

impl DraftEngineConfig {
    pub fn with_owner_policy(owner_policy: OwnerPolicy) -> Self {
        Self { owner_policy }
    }
}

/// Motor del ciclo de vida de borradores.
///
/// Responsabilidades:
/// - Capturar el estado de una entidad como snapshot
/// - Materializar snapshots en entidades vivas (publish) o sobrescribirlas
///   (restore) usando el repositorio registrado para su tipo
/// - Construir vistas tipadas en memoria (materialize)
///
/// `publish` no comprueba si el snapshot ya fue publicado; esa guarda vive
/// en `DraftService::publish`.
pub struct DraftEngine<R>
    where R: DraftRepository
{
    store: DraftStore<R>,
    registry: EntityRegistry,
    config: DraftEngineConfig,
}

impl<R> DraftEngine<R> where R: DraftRepository
{
    /// Crea el motor con reloj del sistema e ids UUID v4.
    pub fn new(repo: Arc<R>, registry: EntityRegistry, config: DraftEngineConfig) -> Self {
        Self::with_collaborators(repo, registry, config, Arc::new(SystemClock), Arc::new(UuidV4Generator))
    }

    pub fn with_collaborators(repo: Arc<R>,
                              registry: EntityRegistry,
                              config: DraftEngineConfig,
                              clock: Arc<dyn Clock>,
                              ids: Arc<dyn IdGenerator>)
                              -> Self {
        Self { store: DraftStore::new(repo, clock, ids, config.owner_policy),
               registry,
               config }
    }

    pub fn store(&self) -> &DraftStore<R> {
        &self.store
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DraftEngineConfig {
        &self.config
    }

    /// create-draft: guarda `payload` como borrador no publicado.
    ///
    /// `entity_id` es la entidad de la que se toma el borrador, si ya existe.
    pub fn create_draft(&self,
                        entity_type: &str,
                        entity_id: Option<EntityKey>,
                        payload: Payload,
                        owner: Option<OwnerRef>,
                        id: Option<Uuid>)
                        -> Result<SnapshotRecord> {
        let record = self.store.create(NewDraft { id,
                                                  entity_type: entity_type.to_string(),
                                                  entity_id,
                                                  payload,
                                                  published_at: None,
                                                  owner,
                                                  metadata: Metadata::new() })?;
        info!("draft {} creado para {}", record.id, record.entity_type);
        Ok(record)
    }

    /// create-with-publish: persiste primero la entidad (update si ya tiene
    /// clave, create si no) y luego guarda su estado post-save como snapshot
    /// publicado. Devuelve la entidad persistida y el snapshot.
    pub fn create_with_publish(&self,
                               entity_type: &str,
                               entity_id: Option<EntityKey>,
                               payload: Payload,
                               owner: Option<OwnerRef>,
                               id: Option<Uuid>)
                               -> Result<(EntityRecord, SnapshotRecord)> {
        let repo = self.registry.resolve(entity_type)?;
        let saved = match &entity_id {
            Some(key) => repo.update_from(key, &payload)?,
            None => repo.create_from(&payload)?,
        };
        let now = self.store.now();
        let created = self.store.create(NewDraft { id,
                                                   entity_type: entity_type.to_string(),
                                                   entity_id: Some(saved.id.clone()),
                                                   payload: saved.fields.clone(),
                                                   published_at: Some(now),
                                                   owner,
                                                   metadata: Metadata::new() });
        match created {
            Ok(record) => {
                info!("{} {} guardado con borrador publicado {}", entity_type, saved.id, record.id);
                Ok((saved, record))
            }
            Err(e) => {
                warn!("{} {} guardado pero su borrador no se pudo crear: {}", entity_type, saved.id, e);
                Err(e)
            }
        }
    }

    /// publish: crea una entidad nueva de `entity_type` desde el payload y
    /// marca el snapshot como publicado.
    ///
    /// Si la creación falla devuelve `DraftError::Publish` y no se escribe
    /// nada en el snapshot. El snapshot recibido nunca se modifica; se
    /// devuelve la versión persistida.
    pub fn publish(&self, snapshot: &SnapshotRecord) -> Result<SnapshotRecord> {
        let repo = self.registry.resolve(&snapshot.entity_type)?;
        let created = repo.create_from(&snapshot.payload)
                          .map_err(|cause| DraftError::Publish { draft_id: snapshot.id,
                                                                 cause: Box::new(cause) })?;
        let mut published = snapshot.clone();
        published.entity_id = Some(created.id.clone());
        published.published_at = Some(self.store.now());
        match self.store.save(published) {
            Ok(saved) => {
                info!("draft {} publicado como {} {}", saved.id, saved.entity_type, created.id);
                Ok(saved)
            }
            Err(e) => {
                warn!("draft {}: entidad {} {} creada pero el borrador no se actualizó: {}",
                      snapshot.id, snapshot.entity_type, created.id, e);
                Err(e)
            }
        }
    }

    /// restore: sobrescribe la entidad existente `entity_id` con el payload
    /// y vuelve a marcar el snapshot como publicado. Nunca crea identidad.
    pub fn restore(&self, snapshot: &SnapshotRecord) -> Result<SnapshotRecord> {
        let entity_id = snapshot.entity_id
                                .clone()
                                .ok_or(RestoreError::MissingEntityId { draft_id: snapshot.id })?;
        let repo = self.registry.resolve(&snapshot.entity_type)?;
        if repo.find_by_id(&entity_id)?.is_none() {
            return Err(RestoreError::EntityNotFound { entity_type: snapshot.entity_type.clone(),
                                                      entity_id }.into());
        }
        let updated = repo.update_from(&entity_id, &snapshot.payload)?;
        let mut restored = snapshot.clone();
        restored.entity_id = Some(updated.id);
        restored.published_at = Some(self.store.now());
        match self.store.save(restored) {
            Ok(saved) => {
                info!("draft {} restaurado sobre {} {}", saved.id, saved.entity_type, entity_id);
                Ok(saved)
            }
            Err(e) => {
                warn!("draft {}: {} {} actualizado pero el borrador quedó desactualizado: {}",
                      snapshot.id, snapshot.entity_type, entity_id, e);
                Err(e)
            }
        }
    }

    /// materialize: construye una entidad `T` en memoria (no persistida) a
    /// partir del snapshot. Con `hydrate = false` la entidad queda en blanco
    /// y sólo se adjuntan el borrador y `published_at`.
    pub fn materialize<T: DraftableEntity>(&self, snapshot: &SnapshotRecord, hydrate: bool) -> Result<Drafted<T>> {
        if snapshot.entity_type != T::type_key() {
            return Err(DraftError::TypeMismatch { expected: T::type_key().to_string(),
                                                  found: snapshot.entity_type.clone() });
        }
        let blank = T::default();
        let entity = if hydrate {
            blank.force_populate(snapshot.entity_id.clone(), &snapshot.payload)?
        } else {
            blank
        };
        Ok(Drafted { entity,
                     published_at: snapshot.published_at,
                     draft: Some(snapshot.clone()) })
    }

    /// Fija una entrada de metadata y persiste el snapshot.
    pub fn set_data(&self, snapshot: &SnapshotRecord, key: &str, value: JsonValue) -> Result<SnapshotRecord> {
        let mut updated = snapshot.clone();
        updated.metadata.insert(key.to_string(), value);
        debug!("draft {}: metadata '{}' actualizada", snapshot.id, key);
        self.store.save(updated)
    }
}
