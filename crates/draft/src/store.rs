// Archivo: store.rs
// Propósito: capa de consulta sobre `DraftRepository`. Asigna ids y
// timestamps al crear, normaliza el propietario según la política y expone
// un builder encadenable (`DraftQuery`) para los scopes publicado/no
// publicado.
use crate::clock::{Clock, IdGenerator};
use crate::domain::{EntityKey, NewDraft, OwnerPolicy, OwnerRef, SnapshotRecord};
use crate::errors::Result;
use crate::repository::{DraftFilter, DraftRepository, OwnerFilter, PublishState};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

/// Almacén de borradores. No cachea: cada llamada va al repositorio.
pub struct DraftStore<R>
    where R: DraftRepository
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    owner_policy: OwnerPolicy,
}

impl<R> DraftStore<R> where R: DraftRepository
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>, owner_policy: OwnerPolicy) -> Self {
        Self { repo,
               clock,
               ids,
               owner_policy }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn owner_policy(&self) -> OwnerPolicy {
        self.owner_policy
    }

    /// Instante actual según el reloj inyectado.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persiste un `SnapshotRecord` nuevo a partir de `fields`.
    ///
    /// El id es el aportado por el caller o uno generado; `created_at` y
    /// `updated_at` toman el instante actual.
    pub fn create(&self, fields: NewDraft) -> Result<SnapshotRecord> {
        let now = self.clock.now();
        let owner = fields.owner.map(|o| self.owner_policy.normalize(o));
        let record = SnapshotRecord { id: fields.id.unwrap_or_else(|| self.ids.next_id()),
                                      entity_type: fields.entity_type,
                                      entity_id: fields.entity_id,
                                      payload: fields.payload,
                                      published_at: fields.published_at,
                                      owner_type: owner.as_ref().and_then(|o| o.owner_type.clone()),
                                      owner_id: owner.map(|o| o.owner_id),
                                      metadata: fields.metadata,
                                      created_at: now,
                                      updated_at: now };
        debug!("draft store: insert {} ({})", record.id, record.entity_type);
        self.repo.insert_draft(&record)
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<SnapshotRecord> {
        self.repo.get_draft(id)
    }

    /// Consulta base: borradores de `entity_type`, filtrados por propietario
    /// sólo cuando se indica uno.
    pub fn query(&self, entity_type: &str, owner: Option<&OwnerRef>) -> DraftQuery<'_, R> {
        let mut filter = DraftFilter::for_type(entity_type);
        if let Some(o) = owner {
            filter = filter.with_owner(OwnerFilter::from_owner(o, self.owner_policy));
        }
        DraftQuery { repo: self.repo.as_ref(),
                     filter }
    }

    /// Actualiza un registro existente sellando `updated_at`.
    pub fn save(&self, mut record: SnapshotRecord) -> Result<SnapshotRecord> {
        record.updated_at = self.clock.now();
        self.repo.update_draft(&record)
    }

    pub fn delete(&self, id: &Uuid) -> Result<()> {
        self.repo.delete_draft(id)
    }
}

/// Consulta encadenable sobre el almacén, al estilo de un query builder.
pub struct DraftQuery<'a, R>
    where R: DraftRepository
{
    repo: &'a R,
    filter: DraftFilter,
}

impl<'a, R> DraftQuery<'a, R> where R: DraftRepository
{
    /// Scope `published_at IS NOT NULL`.
    pub fn published(mut self) -> Self {
        self.filter.state = PublishState::Published;
        self
    }

    /// Scope `published_at IS NULL`.
    pub fn unpublished(mut self) -> Self {
        self.filter.state = PublishState::Unpublished;
        self
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.filter.id = Some(id);
        self
    }

    pub fn for_entity(mut self, entity_id: impl Into<EntityKey>) -> Self {
        self.filter.entity_id = Some(entity_id.into());
        self
    }

    pub fn filter(&self) -> &DraftFilter {
        &self.filter
    }

    pub fn get(self) -> Result<Vec<SnapshotRecord>> {
        self.repo.find_drafts(&self.filter)
    }

    pub fn first(self) -> Result<Option<SnapshotRecord>> {
        Ok(self.repo.find_drafts(&self.filter)?.into_iter().next())
    }
}
