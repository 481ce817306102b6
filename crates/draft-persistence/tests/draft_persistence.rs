use chrono::{TimeZone, Utc};
use draft::{DraftEngineConfig, DraftError, DraftFilter, DraftListing, DraftRepository, DraftScope, DraftService, OwnerRef,
            Payload, PublishState, SnapshotRecord};
use draft_domain::{Article, Author, DomainStubs};
use draft_persistence::{connect, repositories, DieselArticleRepository, DieselDraftRepository};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

// Use a temporary file-backed SQLite DB for tests to avoid URI parsing
// options problems with different sqlite builds.
fn temp_db() -> (PathBuf, DieselDraftRepository, DieselArticleRepository) {
  let tmp_path = std::env::temp_dir().join(format!("draft_test_{}.db", Uuid::new_v4()));
  let pool = connect(tmp_path.to_str().unwrap()).expect("failed to create pool");
  let (drafts, articles) = repositories(pool);
  (tmp_path, drafts, articles)
}

fn record(title: &str, owner: Option<&str>) -> SnapshotRecord {
  let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
  let mut payload = Payload::new();
  payload.insert("title".into(), json!(title));
  payload.insert("body".into(), json!("..."));
  SnapshotRecord { id: Uuid::new_v4(),
                   entity_type: "article".into(),
                   entity_id: None,
                   payload,
                   published_at: None,
                   owner_type: owner.map(|_| "author".to_string()),
                   owner_id: owner.map(str::to_string),
                   metadata: Default::default(),
                   created_at: now,
                   updated_at: now }
}

#[test]
fn diesel_draft_repository_round_trip() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let (tmp_path, repo, _) = temp_db();

  let mut r = record("Hola", Some("1"));
  r.metadata.insert("reviewer".into(), json!({"name": "ana", "score": 3}));
  repo.insert_draft(&r).expect("insert");
  let got = repo.get_draft(&r.id).expect("get");
  assert_eq!(got, r);
  let keys: Vec<&str> = got.payload.keys().map(|k| k.as_str()).collect();
  assert_eq!(keys, vec!["title", "body"]);

  // id duplicado
  assert!(matches!(repo.insert_draft(&r), Err(DraftError::Persistence(_))));
  assert!(matches!(repo.get_draft(&Uuid::new_v4()), Err(DraftError::NotFound(_))));

  let mut published = got.clone();
  published.entity_id = Some("abc".into());
  published.published_at = Some(Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap());
  repo.update_draft(&published).expect("update");
  assert_eq!(repo.get_draft(&r.id).unwrap(), published);

  assert!(matches!(repo.update_draft(&record("x", None)), Err(DraftError::NotFound(_))));
  repo.delete_draft(&r.id).expect("delete");
  assert!(matches!(repo.delete_draft(&r.id), Err(DraftError::NotFound(_))));

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn diesel_filters_keep_insertion_order() {
  if cfg!(feature = "pg") {
    return;
  }
  let (tmp_path, repo, _) = temp_db();
  // mismo created_at en todos: el orden sale de `seq`
  let a = record("a", Some("x"));
  let b = record("b", Some("y"));
  let c = record("c", Some("x"));
  let d = record("d", None);
  for r in [&a, &b, &c, &d] {
    repo.insert_draft(r).unwrap();
  }
  let mut c_pub = c.clone();
  c_pub.published_at = Some(Utc::now());
  repo.update_draft(&c_pub).unwrap();

  let all = repo.find_drafts(&DraftFilter::for_type("article")).unwrap();
  let ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
  assert_eq!(ids, vec![a.id, b.id, c.id, d.id]);

  let owner_x = draft::OwnerFilter::from_owner(&OwnerRef::typed("author", "x"), draft::OwnerPolicy::TypedPair);
  let xs = repo.find_drafts(&DraftFilter::for_type("article").with_owner(owner_x.clone())).unwrap();
  assert_eq!(xs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id, c.id]);

  let x_unpub = repo.find_drafts(&DraftFilter::for_type("article").with_owner(owner_x)
                                                                .with_state(PublishState::Unpublished))
                    .unwrap();
  assert_eq!(x_unpub.len(), 1);
  assert_eq!(x_unpub[0].id, a.id);

  let team_x = draft::OwnerFilter::from_owner(&OwnerRef::typed("team", "x"), draft::OwnerPolicy::TypedPair);
  assert!(repo.find_drafts(&DraftFilter::for_type("article").with_owner(team_x)).unwrap().is_empty());
  let id_only = draft::OwnerFilter::from_owner(&OwnerRef::typed("team", "x"), draft::OwnerPolicy::IdOnly);
  assert_eq!(repo.find_drafts(&DraftFilter::for_type("article").with_owner(id_only)).unwrap().len(), 2);

  let published = repo.find_drafts(&DraftFilter::for_type("article").with_state(PublishState::Published)).unwrap();
  assert_eq!(published.len(), 1);
  assert!(repo.find_drafts(&DraftFilter::for_type("page")).unwrap().is_empty());

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn diesel_article_lifecycle_through_service() {
  if cfg!(feature = "pg") {
    return;
  }
  let (tmp_path, drafts, articles) = temp_db();
  let articles = Arc::new(articles);
  let registry = draft::EntityRegistry::new().with::<Article>(articles.clone());
  let svc = DraftService::new(Arc::new(drafts), registry, DraftEngineConfig::default());

  let ana = Author::new("1", "Ana").unwrap();
  let scope = DraftScope::owned_by(ana.as_owner());
  let draft = svc.save_as_draft(&scope, Article::new("Hello", "mundo").unwrap(), None, None).unwrap();
  assert_eq!(articles.count().unwrap(), 0);

  let published = svc.publish(draft).unwrap();
  assert_eq!(articles.count().unwrap(), 1);
  let key = published.id().unwrap().to_string();
  assert_eq!(articles.get_article(&key).unwrap().unwrap().title(), "Hello");

  // publicar otra vez no crea otro artículo
  let again = svc.publish(published.clone()).unwrap();
  assert_eq!(articles.count().unwrap(), 1);
  assert_eq!(again.published_at, published.published_at);

  // editar, guardar con borrador y restaurar la versión publicada
  let mut edit = published.clone().into_inner();
  edit.set_title("Hello v2").unwrap();
  svc.save_with_draft(&scope, edit, None, None).unwrap();
  assert_eq!(articles.get_article(&key).unwrap().unwrap().title(), "Hello v2");
  let restored = svc.restore(published).unwrap();
  assert_eq!(restored.title(), "Hello");
  assert_eq!(articles.list_articles().unwrap().len(), 1);

  let history = svc.drafts_of(&restored.entity).unwrap();
  assert_eq!(history.len(), 2);
  let restored_draft = restored.draft().unwrap().id;
  let annotated = svc.set_data(restored, "note", json!("rollback")).unwrap();
  assert_eq!(svc.get_draft::<Article>(&scope, &restored_draft).unwrap().get_data("note"), Some(&json!("rollback")));
  assert_eq!(annotated.get_data("note"), Some(&json!("rollback")));

  assert_eq!(svc.get_published_drafts::<Article>(&scope, DraftListing::records()).unwrap().len(), 2);
  assert!(svc.get_unpublished_drafts::<Article>(&scope, DraftListing::records()).unwrap().is_empty());

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn diesel_article_repository_rejects_invalid_publish() {
  if cfg!(feature = "pg") {
    return;
  }
  let (tmp_path, drafts, articles) = temp_db();
  let articles = Arc::new(articles);
  let svc = DraftService::new(Arc::new(drafts), DomainStubs::registry(articles.clone()), DraftEngineConfig::default());
  let scope = DraftScope::unowned();
  let draft = svc.save_as_draft(&scope, Article::default(), None, None).unwrap();
  let draft_id = draft.draft().unwrap().id;
  assert!(matches!(svc.publish(draft), Err(DraftError::Publish { .. })));
  assert_eq!(articles.count().unwrap(), 0);
  assert!(svc.get_draft::<Article>(&scope, &draft_id).unwrap().is_unpublished());
  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn diesel_returned_records_match_stored_rows() {
  if cfg!(feature = "pg") {
    return;
  }
  let (tmp_path, drafts, articles) = temp_db();
  let drafts = Arc::new(drafts);

  // nanosegundos en el registro de entrada: se devuelve lo que queda guardado
  let mut r = record("ns", Some("1"));
  let ns = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + chrono::Duration::nanoseconds(123_456_789);
  r.created_at = ns;
  r.updated_at = ns;
  let inserted = drafts.insert_draft(&r).unwrap();
  assert_eq!(inserted, drafts.get_draft(&r.id).unwrap());
  assert_eq!(inserted.created_at.timestamp_subsec_nanos(), 123_456_000);
  let mut pubd = inserted.clone();
  pubd.published_at = Some(ns);
  assert_eq!(drafts.update_draft(&pubd).unwrap(), drafts.get_draft(&r.id).unwrap());

  // timestamps del reloj del sistema a través del servicio
  let svc = DraftService::new(drafts.clone(),
                              DomainStubs::registry(Arc::new(articles)),
                              DraftEngineConfig::default());
  let scope = DraftScope::unowned();
  let draft = svc.save_as_draft(&scope, Article::new("Reloj", "real").unwrap(), None, None).unwrap();
  let created = draft.draft().unwrap().clone();
  assert_eq!(drafts.get_draft(&created.id).unwrap(), created);

  let published = svc.publish(draft).unwrap();
  let snapshot = published.draft().unwrap().clone();
  assert_eq!(drafts.get_draft(&snapshot.id).unwrap(), snapshot);
  assert_eq!(svc.get_draft::<Article>(&scope, &snapshot.id).unwrap(), snapshot);

  let saved = svc.save_with_draft(&scope, published.into_inner(), None, None).unwrap();
  let snapshot = saved.draft().unwrap().clone();
  assert_eq!(drafts.get_draft(&snapshot.id).unwrap(), snapshot);

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn diesel_concurrent_inserts_all_succeed_in_order() {
  if cfg!(feature = "pg") {
    return;
  }
  let (tmp_path, repo, _) = temp_db();
  let repo = Arc::new(repo);
  let threads = 8;
  let per_thread = 25;

  let inserted: Vec<Vec<Uuid>> = std::thread::scope(|s| {
    let handles: Vec<_> = (0..threads).map(|t| {
                                        let repo = repo.clone();
                                        s.spawn(move || {
                                           (0..per_thread).map(|i| {
                                                            let r = record(&format!("t{}-{}", t, i), Some(&t.to_string()));
                                                            repo.insert_draft(&r).expect("concurrent insert");
                                                            r.id
                                                          })
                                                          .collect::<Vec<_>>()
                                         })
                                      })
                                      .collect();
    handles.into_iter().map(|h| h.join().expect("thread panicked")).collect()
  });

  let all = repo.find_drafts(&DraftFilter::for_type("article")).unwrap();
  assert_eq!(all.len(), threads * per_thread);
  // cada hilo ve sus propios registros en el orden en que los creó
  for (t, ids) in inserted.iter().enumerate() {
    let owner = draft::OwnerFilter::from_owner(&OwnerRef::typed("author", t.to_string()), draft::OwnerPolicy::TypedPair);
    let found: Vec<Uuid> = repo.find_drafts(&DraftFilter::for_type("article").with_owner(owner))
                               .unwrap()
                               .iter()
                               .map(|r| r.id)
                               .collect();
    assert_eq!(&found, ids);
  }

  let _ = std::fs::remove_file(tmp_path);
}
