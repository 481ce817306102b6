// Archivo: service.rs
// Propósito: implementar `DraftService`, la superficie tipada que usan las
// entidades de dominio (saveAsDraft, saveWithDraft, publish, listados de
// borradores). Orquesta el `DraftEngine` y el `DraftStore`.
use crate::domain::{OwnerRef, SnapshotRecord};
use crate::engine::{DraftEngine, DraftEngineConfig};
use crate::entity::{DraftableEntity, Drafted};
use crate::errors::{DraftError, Result};
use crate::registry::EntityRegistry;
use crate::repository::DraftRepository;
use crate::store::DraftQuery;
use log::debug;
use rayon::prelude::*;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// Contexto de propiedad para un lote de operaciones.
///
/// Reemplaza al propietario global: el propietario por defecto se pasa
/// explícitamente en cada llamada.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftScope {
    owner: Option<OwnerRef>,
}

impl DraftScope {
    /// Scope sin propietario: las consultas no filtran por propietario.
    pub fn unowned() -> Self {
        Self::default()
    }

    pub fn owned_by(owner: OwnerRef) -> Self {
        Self { owner: Some(owner) }
    }

    pub fn set_owner(&mut self, owner: OwnerRef) -> &mut Self {
        self.owner = Some(owner);
        self
    }

    pub fn clear_owner(&mut self) -> &mut Self {
        self.owner = None;
        self
    }

    pub fn owner(&self) -> Option<&OwnerRef> {
        self.owner.as_ref()
    }

    /// El propietario explícito tiene prioridad sobre el del scope.
    fn resolve(&self, explicit: Option<OwnerRef>) -> Option<OwnerRef> {
        explicit.or_else(|| self.owner.clone())
    }
}

/// Opciones de los listados de borradores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftListing {
    /// Devolver los registros crudos en lugar de entidades.
    pub unfillable: bool,
    /// Rellenar la entidad con el payload (si no, queda en blanco).
    pub hydrate: bool,
}

impl Default for DraftListing {
    fn default() -> Self {
        Self { unfillable: false,
               hydrate: true }
    }
}

impl DraftListing {
    pub fn records() -> Self {
        Self { unfillable: true,
               hydrate: false }
    }

    pub fn blank() -> Self {
        Self { unfillable: false,
               hydrate: false }
    }
}

/// Elemento de un listado: registro crudo o entidad materializada.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEntry<T> {
    Record(SnapshotRecord),
    Entity(Drafted<T>),
}

impl<T> DraftEntry<T> {
    /// Snapshot subyacente en ambos casos.
    pub fn record(&self) -> Option<&SnapshotRecord> {
        match self {
            DraftEntry::Record(r) => Some(r),
            DraftEntry::Entity(d) => d.draft.as_ref(),
        }
    }

    pub fn into_entity(self) -> Option<Drafted<T>> {
        match self {
            DraftEntry::Entity(d) => Some(d),
            DraftEntry::Record(_) => None,
        }
    }
}

/// Servicio de alto nivel con la API de borradores por tipo de entidad.
pub struct DraftService<R>
    where R: DraftRepository
{
    engine: Arc<DraftEngine<R>>,
}

impl<R> DraftService<R> where R: DraftRepository
{
    /// Crea el servicio inyectando el repositorio de snapshots, el registro
    /// de entidades y la configuración. El `DraftEngine` se construye
    /// internamente.
    pub fn new(repo: Arc<R>, registry: EntityRegistry, config: DraftEngineConfig) -> Self {
        Self { engine: Arc::new(DraftEngine::new(repo, registry, config)) }
    }

    pub fn from_engine(engine: Arc<DraftEngine<R>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<DraftEngine<R>> {
        &self.engine
    }

    /// Guarda el estado actual de `entity` como borrador no publicado. La
    /// entidad no se escribe en su tabla.
    pub fn save_as_draft<T: DraftableEntity>(&self,
                                             scope: &DraftScope,
                                             entity: T,
                                             owner: Option<OwnerRef>,
                                             id: Option<Uuid>)
                                             -> Result<Drafted<T>> {
        let payload = entity.to_payload()?;
        let draft = self.engine
                        .create_draft(T::type_key(), entity.entity_key(), payload, scope.resolve(owner), id)?;
        Ok(Drafted { entity,
                     published_at: None,
                     draft: Some(draft) })
    }

    /// Persiste `entity` y deja un borrador ya publicado con su estado
    /// post-save. La entidad devuelta lleva la clave asignada y queda marcada
    /// como publicada.
    pub fn save_with_draft<T: DraftableEntity>(&self,
                                               scope: &DraftScope,
                                               entity: T,
                                               owner: Option<OwnerRef>,
                                               id: Option<Uuid>)
                                               -> Result<Drafted<T>> {
        let payload = entity.to_payload()?;
        let (saved, draft) =
            self.engine
                .create_with_publish(T::type_key(), entity.entity_key(), payload, scope.resolve(owner), id)?;
        let entity = T::default().force_populate(Some(saved.id), &saved.fields)?;
        Ok(Drafted { entity,
                     published_at: draft.published_at,
                     draft: Some(draft) })
    }

    /// Publica el borrador asociado. Si la entidad ya está publicada no hace
    /// nada.
    pub fn publish<T: DraftableEntity>(&self, drafted: Drafted<T>) -> Result<Drafted<T>> {
        if drafted.published_at.is_some() {
            debug!("publish ignorado: {} ya publicado", T::type_key());
            return Ok(drafted);
        }
        let draft = drafted.draft.as_ref().ok_or(DraftError::NoDraftAssociated)?;
        let published = self.engine.publish(draft)?;
        self.refresh(drafted, published)
    }

    /// Restaura la entidad viva desde el borrador asociado.
    pub fn restore<T: DraftableEntity>(&self, drafted: Drafted<T>) -> Result<Drafted<T>> {
        let draft = drafted.draft.as_ref().ok_or(DraftError::NoDraftAssociated)?;
        let restored = self.engine.restore(draft)?;
        self.refresh(drafted, restored)
    }

    /// Fija metadata en el borrador asociado y devuelve la entidad con la
    /// referencia actualizada.
    pub fn set_data<T: DraftableEntity>(&self, mut drafted: Drafted<T>, key: &str, value: JsonValue) -> Result<Drafted<T>> {
        let draft = drafted.draft.as_ref().ok_or(DraftError::NoDraftAssociated)?;
        let updated = self.engine.set_data(draft, key, value)?;
        drafted.draft = Some(updated);
        Ok(drafted)
    }

    /// Todos los borradores del tipo `T` visibles en `scope`.
    pub fn get_all_drafts<T: DraftableEntity>(&self, scope: &DraftScope, listing: DraftListing) -> Result<Vec<DraftEntry<T>>> {
        let records = self.drafts_query::<T>(scope).get()?;
        self.build_collection(records, listing)
    }

    pub fn get_published_drafts<T: DraftableEntity>(&self,
                                                    scope: &DraftScope,
                                                    listing: DraftListing)
                                                    -> Result<Vec<DraftEntry<T>>> {
        let records = self.drafts_query::<T>(scope).published().get()?;
        self.build_collection(records, listing)
    }

    pub fn get_unpublished_drafts<T: DraftableEntity>(&self,
                                                      scope: &DraftScope,
                                                      listing: DraftListing)
                                                      -> Result<Vec<DraftEntry<T>>> {
        let records = self.drafts_query::<T>(scope).unpublished().get()?;
        self.build_collection(records, listing)
    }

    /// Busca un borrador por id dentro del tipo `T` y del propietario del
    /// scope. `NotFound` si no existe o pertenece a otro propietario.
    pub fn get_draft<T: DraftableEntity>(&self, scope: &DraftScope, id: &Uuid) -> Result<SnapshotRecord> {
        self.drafts_query::<T>(scope)
            .with_id(*id)
            .first()?
            .ok_or_else(|| DraftError::NotFound(format!("draft {} de {}", id, T::type_key())))
    }

    /// Historial de borradores de una entidad viva, sin filtro de propietario.
    pub fn drafts_of<T: DraftableEntity>(&self, entity: &T) -> Result<Vec<SnapshotRecord>> {
        match entity.entity_key() {
            Some(key) => self.engine.store().query(T::type_key(), None).for_entity(key).get(),
            None => Ok(Vec::new()),
        }
    }

    fn drafts_query<T: DraftableEntity>(&self, scope: &DraftScope) -> DraftQuery<'_, R> {
        self.engine.store().query(T::type_key(), scope.owner())
    }

    /// Convierte registros en el listado pedido manteniendo el orden de la
    /// consulta.
    fn build_collection<T: DraftableEntity>(&self,
                                            records: Vec<SnapshotRecord>,
                                            listing: DraftListing)
                                            -> Result<Vec<DraftEntry<T>>> {
        if listing.unfillable {
            return Ok(records.into_iter().map(DraftEntry::Record).collect());
        }
        let engine = &self.engine;
        records.par_iter()
               .map(|r| engine.materialize::<T>(r, listing.hydrate).map(DraftEntry::Entity))
               .collect()
    }

    fn refresh<T: DraftableEntity>(&self, drafted: Drafted<T>, snapshot: SnapshotRecord) -> Result<Drafted<T>> {
        let entity = drafted.entity.force_populate(snapshot.entity_id.clone(), &snapshot.payload)?;
        Ok(Drafted { entity,
                     published_at: snapshot.published_at,
                     draft: Some(snapshot) })
    }
}
