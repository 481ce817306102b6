//! Persistencia Diesel para el crate `draft`.
//! Expone el módulo `schema`, el repositorio de borradores
//! (`DieselDraftRepository`, tabla `draftables`) y el de artículos
//! (`DieselArticleRepository`). Ambos comparten un pool r2d2 creado con
//! `connect` o `new_from_env`, que aplica las migraciones embebidas.

mod article_persistence;
mod draft_persistence;
pub mod schema;

pub use article_persistence::DieselArticleRepository;
pub use draft_persistence::{connect, new_from_env, DbConn, DbPool, DieselDraftRepository, MIGRATIONS};

use std::sync::Arc;

/// Repositorio de borradores y de artículos sobre el mismo pool.
pub fn repositories(pool: Arc<DbPool>) -> (DieselDraftRepository, DieselArticleRepository) {
  (DieselDraftRepository::new(pool.clone()), DieselArticleRepository::new(pool))
}
