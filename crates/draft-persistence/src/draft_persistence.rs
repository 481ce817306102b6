use crate::schema;
use crate::schema::draftables::dsl as drafts_dsl;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use draft::{DraftError, DraftFilter, DraftRepository, OwnerFilter, PublishState, SnapshotRecord};
use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(feature = "pg")]
pub type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
pub type DbConn = SqliteConnection;
#[cfg(feature = "pg")]
type DbBackend = diesel::pg::Pg;
#[cfg(not(feature = "pg"))]
type DbBackend = diesel::sqlite::Sqlite;
pub type DbPool = Pool<ConnectionManager<DbConn>>;

/// Pragmas por conexión: `busy_timeout` vive en cada conexión SQLite, así
/// que se instala al abrir cada una del pool y no solo en la primera.
#[cfg(not(feature = "pg"))]
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
  busy_timeout_ms: u32,
}

#[cfg(not(feature = "pg"))]
impl r2d2::CustomizeConnection<DbConn, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut DbConn) -> Result<(), diesel::r2d2::Error> {
    use diesel::connection::SimpleConnection;
    conn.batch_execute(&format!("PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL;", self.busy_timeout_ms))
        .map_err(diesel::r2d2::Error::QueryError)
  }
}

/// Crea el pool de conexiones y aplica las migraciones pendientes.
pub fn connect(database_url: &str) -> Result<Arc<DbPool>, DraftError> {
  let manager = ConnectionManager::<DbConn>::new(database_url);
  let builder = DbPool::builder().max_size(4);
  #[cfg(not(feature = "pg"))]
  let builder = builder.connection_customizer(Box::new(SqlitePragmas { busy_timeout_ms: 5000 }));
  let pool = builder.build(manager)
                    .map_err(|e| DraftError::Persistence(format!("no se pudo crear el pool de conexiones: {}", e)))?;
  let mut c = pool.get().map_err(|e| DraftError::Persistence(format!("pool: {}", e)))?;
  c.run_pending_migrations(MIGRATIONS)
   .map_err(|e| DraftError::Persistence(format!("migraciones: {}", e)))?;
  info!("draft-persistence: base de datos lista");
  Ok(Arc::new(pool))
}

/// Transacción de escritura. En SQLite se toma el lock de escritura al
/// empezar (`BEGIN IMMEDIATE`) para que leer `max(seq)` y luego insertar no
/// choque con otro escritor a mitad de transacción.
#[cfg(not(feature = "pg"))]
fn write_transaction<T, F>(conn: &mut DbConn, f: F) -> Result<T, DieselError>
  where F: FnOnce(&mut DbConn) -> Result<T, DieselError>
{
  conn.immediate_transaction(f)
}

#[cfg(feature = "pg")]
fn write_transaction<T, F>(conn: &mut DbConn, f: F) -> Result<T, DieselError>
  where F: FnOnce(&mut DbConn) -> Result<T, DieselError>
{
  conn.transaction(|c| {
        diesel::sql_query("LOCK TABLE draftables IN SHARE ROW EXCLUSIVE MODE").execute(c)?;
        f(c)
      })
}

/// Lee `DRAFT_DB_URL` (o `DATABASE_URL`) usando `.env` si existe.
///
/// Sin `pg`, si ninguna variable está definida se usa una base SQLite en
/// memoria compartida.
#[cfg(not(feature = "pg"))]
pub fn new_from_env() -> Result<Arc<DbPool>, DraftError> {
  dotenvy::dotenv().ok();
  let url = std::env::var("DRAFT_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .unwrap_or_else(|_| "file:draftdb?mode=memory&cache=shared".into());
  let l = url.to_lowercase();
  if l.starts_with("postgres") {
    return Err(DraftError::Persistence("draft-persistence was compiled without 'pg' feature; enable the 'pg' feature \
                                        to use Postgres"
                                                       .into()));
  }
  connect(&url)
}

#[cfg(feature = "pg")]
pub fn new_from_env() -> Result<Arc<DbPool>, DraftError> {
  dotenvy::dotenv().ok();
  let url = std::env::var("DRAFT_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .map_err(|_| DraftError::Persistence("DRAFT_DB_URL / DATABASE_URL not set".into()))?;
  let l = url.to_lowercase();
  if !(l.starts_with("postgres") || l.starts_with("postgresql://") || url.contains('@')) {
    return Err(DraftError::Persistence("DRAFT_DB_URL / DATABASE_URL does not look like Postgres URL".into()));
  }
  connect(&url)
}

/// Repo Diesel que implementa `DraftRepository` sobre la tabla `draftables`.
pub struct DieselDraftRepository {
  pool: Arc<DbPool>,
}
impl DieselDraftRepository {
  pub fn new(pool: Arc<DbPool>) -> Self {
    Self { pool }
  }
  pub fn pool(&self) -> &Arc<DbPool> {
    &self.pool
  }
  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, DraftError> {
    self.pool.get().map_err(|e| DraftError::Persistence(format!("pool: {}", e)))
  }
}

// Fila Diesel de `draftables`; el orden de campos sigue al `table!`.
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::draftables)]
struct DraftRow {
  pub id: String,
  pub seq: i64,
  pub entity_type: String,
  pub entity_id: Option<String>,
  pub payload: String,
  pub published_at_ts: Option<i64>,
  pub owner_type: Option<String>,
  pub owner_id: Option<String>,
  pub metadata: String,
  pub created_at_ts: i64,
  pub updated_at_ts: i64,
}

fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T, DraftError> {
  res.map_err(|e| DraftError::Persistence(format!("db: {}", e)))
}

pub(crate) fn ts_from_micros(v: i64) -> Result<DateTime<Utc>, DraftError> {
  DateTime::<Utc>::from_timestamp_micros(v).ok_or_else(|| DraftError::Persistence(format!("timestamp inválido: {}", v)))
}

impl DraftRow {
  fn from_record(r: &SnapshotRecord, seq: i64) -> Result<Self, DraftError> {
    Ok(Self { id: r.id.to_string(),
              seq,
              entity_type: r.entity_type.clone(),
              entity_id: r.entity_id.clone(),
              payload: serde_json::to_string(&r.payload)?,
              published_at_ts: r.published_at.map(|t| t.timestamp_micros()),
              owner_type: r.owner_type.clone(),
              owner_id: r.owner_id.clone(),
              metadata: serde_json::to_string(&r.metadata)?,
              created_at_ts: r.created_at.timestamp_micros(),
              updated_at_ts: r.updated_at.timestamp_micros() })
  }

  fn into_record(self) -> Result<SnapshotRecord, DraftError> {
    Ok(SnapshotRecord { id: Uuid::parse_str(&self.id).map_err(|e| DraftError::Persistence(format!("invalid uuid: {}", e)))?,
                        entity_type: self.entity_type,
                        entity_id: self.entity_id,
                        payload: serde_json::from_str(&self.payload)?,
                        published_at: self.published_at_ts.map(ts_from_micros).transpose()?,
                        owner_type: self.owner_type,
                        owner_id: self.owner_id,
                        metadata: serde_json::from_str(&self.metadata)?,
                        created_at: ts_from_micros(self.created_at_ts)?,
                        updated_at: ts_from_micros(self.updated_at_ts)? })
  }
}

/// Traduce `DraftFilter` a una consulta boxed sobre `draftables`.
fn filtered(filter: &DraftFilter) -> schema::draftables::BoxedQuery<'static, DbBackend> {
  let mut q = drafts_dsl::draftables.into_boxed::<DbBackend>();
  if let Some(id) = &filter.id {
    q = q.filter(drafts_dsl::id.eq(id.to_string()));
  }
  if let Some(t) = &filter.entity_type {
    q = q.filter(drafts_dsl::entity_type.eq(t.clone()));
  }
  if let Some(e) = &filter.entity_id {
    q = q.filter(drafts_dsl::entity_id.eq(e.clone()));
  }
  match &filter.owner {
    Some(OwnerFilter::Pair { owner_type, owner_id }) => {
      q = q.filter(drafts_dsl::owner_id.eq(owner_id.clone()));
      q = match owner_type {
        Some(t) => q.filter(drafts_dsl::owner_type.eq(t.clone())),
        None => q.filter(drafts_dsl::owner_type.is_null()),
      };
    }
    Some(OwnerFilter::IdOnly(owner_id)) => {
      q = q.filter(drafts_dsl::owner_id.eq(owner_id.clone()));
    }
    None => {}
  }
  q = match filter.state {
    PublishState::Any => q,
    PublishState::Published => q.filter(drafts_dsl::published_at_ts.is_not_null()),
    PublishState::Unpublished => q.filter(drafts_dsl::published_at_ts.is_null()),
  };
  q.order(drafts_dsl::seq.asc())
}

impl DraftRepository for DieselDraftRepository {
  fn insert_draft(&self, record: &SnapshotRecord) -> Result<SnapshotRecord, DraftError> {
    let mut conn = self.conn()?;
    let base = DraftRow::from_record(record, 0)?;
    // `seq` conserva el orden de creación aunque dos registros compartan
    // `created_at`.
    let row = map_db_err(write_transaction(&mut conn, |c| {
                let last: Option<i64> = drafts_dsl::draftables.select(diesel::dsl::max(drafts_dsl::seq)).first(c)?;
                let row = DraftRow { seq: last.unwrap_or(0) + 1,
                                     ..base };
                diesel::insert_into(drafts_dsl::draftables).values(&row).execute(c)?;
                Ok(row)
              }))?;
    debug!("draftables: insert {} ({}) seq={}", record.id, record.entity_type, row.seq);
    // se devuelve lo guardado: los timestamps quedan en microsegundos
    row.into_record()
  }

  fn get_draft(&self, id: &Uuid) -> Result<SnapshotRecord, DraftError> {
    let mut conn = self.conn()?;
    let row = map_db_err(drafts_dsl::draftables.filter(drafts_dsl::id.eq(id.to_string()))
                                               .first::<DraftRow>(&mut conn)
                                               .optional())?;
    match row {
      Some(r) => r.into_record(),
      None => Err(DraftError::NotFound(format!("draft {}", id))),
    }
  }

  fn find_drafts(&self, filter: &DraftFilter) -> Result<Vec<SnapshotRecord>, DraftError> {
    let mut conn = self.conn()?;
    let rows = map_db_err(filtered(filter).load::<DraftRow>(&mut conn))?;
    rows.into_iter().map(DraftRow::into_record).collect()
  }

  fn update_draft(&self, record: &SnapshotRecord) -> Result<SnapshotRecord, DraftError> {
    use schema::draftables::dsl::*;
    let mut conn = self.conn()?;
    let row = DraftRow::from_record(record, 0)?;
    let affected = map_db_err(diesel::update(draftables.filter(id.eq(&row.id))).set((entity_id.eq(row.entity_id.clone()),
                                                                                      payload.eq(&row.payload),
                                                                                      published_at_ts.eq(row.published_at_ts),
                                                                                      owner_type.eq(row.owner_type.clone()),
                                                                                      owner_id.eq(row.owner_id.clone()),
                                                                                      metadata.eq(&row.metadata),
                                                                                      updated_at_ts.eq(row.updated_at_ts)))
                                                                                .execute(&mut conn))?;
    if affected == 0 {
      return Err(DraftError::NotFound(format!("draft {}", record.id)));
    }
    debug!("draftables: update {}", record.id);
    let stored = map_db_err(draftables.filter(id.eq(&row.id)).first::<DraftRow>(&mut conn))?;
    stored.into_record()
  }

  fn delete_draft(&self, draft_id: &Uuid) -> Result<(), DraftError> {
    use schema::draftables::dsl::*;
    let mut conn = self.conn()?;
    let affected = map_db_err(diesel::delete(draftables.filter(id.eq(draft_id.to_string()))).execute(&mut conn))?;
    if affected == 0 {
      return Err(DraftError::NotFound(format!("draft {}", draft_id)));
    }
    Ok(())
  }
}
