use chrono::{Duration, TimeZone, Utc};
use draft::clock::{Clock, FixedClock, UuidV4Generator};
use draft::domain::{EntityKey, EntityRecord, Payload};
use draft::entity::{deserialize_payload, serialize_payload, DraftableEntity, Identifiable};
use draft::errors::{DraftError, RestoreError, Result};
use draft::registry::EntityRegistry;
use draft::repository::EntityRepository;
use draft::stubs::{InMemoryDraftRepository, InMemoryEntityRepository};
use draft::{DraftEngine, DraftEngineConfig, DraftRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Note {
  #[serde(skip)]
  id: Option<String>,
  title: String,
  body: String,
}

impl Identifiable for Note {
  fn type_key() -> &'static str {
    "note"
  }

  fn entity_key(&self) -> Option<EntityKey> {
    self.id.clone()
  }
}

impl DraftableEntity for Note {
  fn to_payload(&self) -> Result<Payload> {
    serialize_payload(self, "id")
  }

  fn force_populate(self, key: Option<EntityKey>, payload: &Payload) -> Result<Self> {
    let mut n: Note = deserialize_payload(payload)?;
    n.id = key.or(self.id);
    Ok(n)
  }
}

/// Repositorio que rechaza cualquier creación (p.ej. validación fallida).
struct RejectingRepository;

impl EntityRepository for RejectingRepository {
  fn create_from(&self, _payload: &Payload) -> Result<EntityRecord> {
    Err(DraftError::Persistence("title no puede estar vacío".into()))
  }

  fn update_from(&self, id: &EntityKey, _payload: &Payload) -> Result<EntityRecord> {
    Err(DraftError::NotFound(id.clone()))
  }

  fn find_by_id(&self, _id: &EntityKey) -> Result<Option<EntityRecord>> {
    Ok(None)
  }
}

struct Fixture {
  drafts: Arc<InMemoryDraftRepository>,
  notes: Arc<InMemoryEntityRepository>,
  clock: Arc<FixedClock>,
  engine: DraftEngine<InMemoryDraftRepository>,
}

fn fixture() -> Fixture {
  let drafts = Arc::new(InMemoryDraftRepository::new());
  let notes = Arc::new(InMemoryEntityRepository::new());
  let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
  let mut registry = EntityRegistry::new();
  registry.register("note", notes.clone());
  registry.register("broken", Arc::new(RejectingRepository));
  let engine = DraftEngine::with_collaborators(drafts.clone(),
                                               registry,
                                               DraftEngineConfig::default(),
                                               clock.clone(),
                                               Arc::new(UuidV4Generator));
  Fixture { drafts,
            notes,
            clock,
            engine }
}

fn payload(title: &str, body: &str) -> Payload {
  let mut p = Payload::new();
  p.insert("title".into(), json!(title));
  p.insert("body".into(), json!(body));
  p
}

#[test]
fn publish_creates_entity_and_marks_draft() {
  let f = fixture();
  let draft = f.engine.create_draft("note", None, payload("Hola", "..."), None, None).unwrap();
  assert!(draft.is_unpublished());
  assert!(f.notes.is_empty().unwrap());

  let at = f.clock.advance(Duration::seconds(30));
  let published = f.engine.publish(&draft).unwrap();
  assert_eq!(published.published_at, Some(at));
  assert_eq!(published.updated_at, at);
  assert_eq!(published.created_at, draft.created_at);

  let entity_id = published.entity_id.clone().unwrap();
  let row = f.notes.find_by_id(&entity_id).unwrap().unwrap();
  assert_eq!(row.fields, draft.payload);
  assert_eq!(f.drafts.get_draft(&draft.id).unwrap(), published);
  // el registro de entrada no se modifica
  assert!(draft.is_unpublished());
}

#[test]
fn publish_twice_at_engine_level_creates_a_second_entity() {
  let f = fixture();
  let draft = f.engine.create_draft("note", None, payload("A", "B"), None, None).unwrap();
  let first = f.engine.publish(&draft).unwrap();
  let second = f.engine.publish(&first).unwrap();
  assert_eq!(f.notes.len().unwrap(), 2);
  assert_ne!(first.entity_id, second.entity_id);
}

#[test]
fn publish_failure_leaves_draft_unchanged() {
  let f = fixture();
  let draft = f.engine.create_draft("broken", None, payload("", ""), None, None).unwrap();
  match f.engine.publish(&draft) {
    Err(DraftError::Publish { draft_id, cause }) => {
      assert_eq!(draft_id, draft.id);
      assert!(matches!(*cause, DraftError::Persistence(_)));
    }
    other => panic!("expected Publish error, got {:?}", other),
  }
  let stored = f.drafts.get_draft(&draft.id).unwrap();
  assert_eq!(stored, draft);
  assert!(stored.entity_id.is_none());
}

#[test]
fn publish_unknown_type_fails() {
  let f = fixture();
  let draft = f.engine.create_draft("ghost", None, Payload::new(), None, None).unwrap();
  assert!(matches!(f.engine.publish(&draft), Err(DraftError::UnknownEntityType(t)) if t == "ghost"));
}

#[test]
fn failed_snapshot_save_leaves_orphan_entity() {
  let f = fixture();
  let draft = f.engine.create_draft("note", None, payload("A", "B"), None, None).unwrap();
  f.drafts.set_reject_updates(true);
  assert!(matches!(f.engine.publish(&draft), Err(DraftError::Persistence(_))));
  f.drafts.set_reject_updates(false);
  // la entidad quedó creada pero el borrador sigue sin publicar
  assert_eq!(f.notes.len().unwrap(), 1);
  assert!(f.drafts.get_draft(&draft.id).unwrap().is_unpublished());
}

#[test]
fn restore_overwrites_existing_entity_without_new_identity() {
  let f = fixture();
  let draft = f.engine.create_draft("note", None, payload("v1", "cuerpo"), None, None).unwrap();
  let published = f.engine.publish(&draft).unwrap();
  let entity_id = published.entity_id.clone().unwrap();

  // la entidad viva cambia después de publicar
  f.notes.update_from(&entity_id, &payload("v2", "otro")).unwrap();

  let at = f.clock.advance(Duration::hours(1));
  let restored = f.engine.restore(&published).unwrap();
  assert_eq!(restored.entity_id.as_ref(), Some(&entity_id));
  assert_eq!(restored.published_at, Some(at));
  assert_eq!(f.notes.len().unwrap(), 1);
  let row = f.notes.find_by_id(&entity_id).unwrap().unwrap();
  assert_eq!(row.fields["title"], json!("v1"));
  assert_eq!(row.fields["body"], json!("cuerpo"));
}

#[test]
fn restore_without_entity_id_fails() {
  let f = fixture();
  let draft = f.engine.create_draft("note", None, payload("A", "B"), None, None).unwrap();
  match f.engine.restore(&draft) {
    Err(DraftError::Restore(RestoreError::MissingEntityId { draft_id })) => assert_eq!(draft_id, draft.id),
    other => panic!("expected MissingEntityId, got {:?}", other),
  }
  assert!(f.notes.is_empty().unwrap());
}

#[test]
fn restore_of_missing_entity_fails_and_keeps_draft() {
  let f = fixture();
  let draft = f.engine.create_draft("note", Some("42".into()), payload("A", "B"), None, None).unwrap();
  match f.engine.restore(&draft) {
    Err(DraftError::Restore(RestoreError::EntityNotFound { entity_type, entity_id })) => {
      assert_eq!(entity_type, "note");
      assert_eq!(entity_id, "42");
    }
    other => panic!("expected EntityNotFound, got {:?}", other),
  }
  assert_eq!(f.drafts.get_draft(&draft.id).unwrap(), draft);
  assert!(f.notes.is_empty().unwrap());
}

#[test]
fn create_with_publish_updates_existing_entity() {
  let f = fixture();
  let created = f.notes.create_from(&payload("orig", "x")).unwrap();
  let (saved, snapshot) = f.engine
                           .create_with_publish("note", Some(created.id.clone()), payload("nuevo", "y"), None, None)
                           .unwrap();
  assert_eq!(saved.id, created.id);
  assert_eq!(f.notes.len().unwrap(), 1);
  assert_eq!(snapshot.entity_id.as_ref(), Some(&created.id));
  assert_eq!(snapshot.published_at, Some(f.clock.now()));
  assert_eq!(snapshot.payload["title"], json!("nuevo"));
}

#[test]
fn create_with_publish_without_key_creates_entity() {
  let f = fixture();
  let (saved, snapshot) = f.engine.create_with_publish("note", None, payload("A", "B"), None, None).unwrap();
  assert_eq!(f.notes.len().unwrap(), 1);
  assert_eq!(snapshot.entity_id, Some(saved.id));
  assert!(snapshot.is_published());
}

#[test]
fn materialize_hydrates_or_leaves_blank() {
  let f = fixture();
  let draft = f.engine.create_draft("note", Some("3".into()), payload("T", "B"), None, None).unwrap();

  let full = f.engine.materialize::<Note>(&draft, true).unwrap();
  assert_eq!(full.entity,
             Note { id: Some("3".into()),
                    title: "T".into(),
                    body: "B".into() });
  assert!(!full.is_published());
  assert_eq!(full.draft(), Some(&draft));

  let blank = f.engine.materialize::<Note>(&draft, false).unwrap();
  assert_eq!(blank.entity, Note::default());
  assert_eq!(blank.draft(), Some(&draft));
  // materializar no persiste nada
  assert!(f.notes.is_empty().unwrap());
}

#[test]
fn materialize_rejects_other_types() {
  let f = fixture();
  let draft = f.engine.create_draft("broken", None, Payload::new(), None, None).unwrap();
  match f.engine.materialize::<Note>(&draft, true) {
    Err(DraftError::TypeMismatch { expected, found }) => {
      assert_eq!(expected, "note");
      assert_eq!(found, "broken");
    }
    other => panic!("expected TypeMismatch, got {:?}", other),
  }
}

#[test]
fn set_data_persists_metadata() {
  let f = fixture();
  let draft = f.engine.create_draft("note", None, payload("A", "B"), None, None).unwrap();
  let updated = f.engine.set_data(&draft, "reviewer", json!("ana")).unwrap();
  assert_eq!(updated.get_data("reviewer"), Some(&json!("ana")));
  assert_eq!(updated.get_data("missing"), None);
  let stored = f.drafts.get_draft(&draft.id).unwrap();
  assert_eq!(stored.get_data("reviewer"), Some(&json!("ana")));
  assert!(stored.is_unpublished());
}
