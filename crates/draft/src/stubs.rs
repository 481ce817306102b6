// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye un repositorio de snapshots (`InMemoryDraftRepository`) y un
// repositorio genérico de entidades (`InMemoryEntityRepository`). No son
// durables y se usan para demos o pruebas locales.
use crate::domain::{EntityKey, EntityRecord, Payload, SnapshotRecord};
use crate::errors::{DraftError, Result};
use crate::repository::{DraftFilter, DraftRepository, EntityRepository};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Helper para mapear `Mutex::lock()` en un `Result` con
/// `DraftError::Persistence`.
fn lock<T>(m: &Mutex<T>) -> std::result::Result<MutexGuard<'_, T>, DraftError> {
    m.lock().map_err(|e| DraftError::Persistence(format!("mutex poisoned: {:?}", e)))
}

// Minimal in-memory snapshot repository (not durable)
pub struct InMemoryDraftRepository {
    /// Registros en orden de inserción.
    drafts: Mutex<Vec<SnapshotRecord>>,
    /// Cuando está activo, `update_draft` falla como si se perdiera la
    /// conexión. Permite probar la ventana sin atomicidad de publish.
    reject_updates: AtomicBool,
}

impl InMemoryDraftRepository {
    /// Crea una nueva instancia del repositorio en memoria.
    pub fn new() -> Self {
        Self { drafts: Mutex::new(Vec::new()),
               reject_updates: AtomicBool::new(false) }
    }

    pub fn set_reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    /// Número total de registros guardados.
    pub fn len(&self) -> Result<usize> {
        Ok(lock(&self.drafts)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryDraftRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftRepository for InMemoryDraftRepository {
    /// Inserta el registro al final. Un id repetido se trata como violación
    /// de la clave primaria.
    fn insert_draft(&self, record: &SnapshotRecord) -> Result<SnapshotRecord> {
        let mut drafts = lock(&self.drafts)?;
        if drafts.iter().any(|d| d.id == record.id) {
            return Err(DraftError::Persistence(format!("clave duplicada en draftables: {}", record.id)));
        }
        drafts.push(record.clone());
        Ok(record.clone())
    }

    fn get_draft(&self, id: &Uuid) -> Result<SnapshotRecord> {
        let drafts = lock(&self.drafts)?;
        drafts.iter()
              .find(|d| d.id == *id)
              .cloned()
              .ok_or(DraftError::NotFound(format!("draft {}", id)))
    }

    fn find_drafts(&self, filter: &DraftFilter) -> Result<Vec<SnapshotRecord>> {
        let drafts = lock(&self.drafts)?;
        Ok(drafts.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    /// Reemplaza el registro conservando su posición de inserción.
    fn update_draft(&self, record: &SnapshotRecord) -> Result<SnapshotRecord> {
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(DraftError::Persistence("conexión rechazada (update)".into()));
        }
        let mut drafts = lock(&self.drafts)?;
        let slot = drafts.iter_mut()
                         .find(|d| d.id == record.id)
                         .ok_or(DraftError::NotFound(format!("draft {}", record.id)))?;
        *slot = record.clone();
        Ok(record.clone())
    }

    fn delete_draft(&self, id: &Uuid) -> Result<()> {
        let mut drafts = lock(&self.drafts)?;
        let before = drafts.len();
        drafts.retain(|d| d.id != *id);
        if drafts.len() == before {
            return Err(DraftError::NotFound(format!("draft {}", id)));
        }
        Ok(())
    }
}

/// Repositorio genérico de entidades en memoria: filas `clave -> payload`
/// con claves numéricas secuenciales.
pub struct InMemoryEntityRepository {
    rows: Mutex<IndexMap<EntityKey, Payload>>,
    next_id: AtomicU64,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self { rows: Mutex::new(IndexMap::new()),
               next_id: AtomicU64::new(1) }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(lock(&self.rows)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Todas las filas en orden de creación.
    pub fn all(&self) -> Result<Vec<EntityRecord>> {
        let rows = lock(&self.rows)?;
        Ok(rows.iter()
               .map(|(k, v)| EntityRecord { id: k.clone(),
                                            fields: v.clone() })
               .collect())
    }
}

impl Default for InMemoryEntityRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRepository for InMemoryEntityRepository {
    fn create_from(&self, payload: &Payload) -> Result<EntityRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        lock(&self.rows)?.insert(id.clone(), payload.clone());
        Ok(EntityRecord { id,
                          fields: payload.clone() })
    }

    /// Mezcla los campos de `payload` sobre la fila existente.
    fn update_from(&self, id: &EntityKey, payload: &Payload) -> Result<EntityRecord> {
        let mut rows = lock(&self.rows)?;
        let row = rows.get_mut(id).ok_or(DraftError::NotFound(format!("entidad {}", id)))?;
        for (k, v) in payload {
            row.insert(k.clone(), v.clone());
        }
        Ok(EntityRecord { id: id.clone(),
                          fields: row.clone() })
    }

    fn find_by_id(&self, id: &EntityKey) -> Result<Option<EntityRecord>> {
        let rows = lock(&self.rows)?;
        Ok(rows.get(id).map(|fields| EntityRecord { id: id.clone(),
                                                    fields: fields.clone() }))
    }
}
