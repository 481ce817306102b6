//! Crate `draft`: versionado por borradores para entidades de dominio
//!
//! Este crate define el registro de snapshot (`SnapshotRecord`), el contrato
//! de persistencia `DraftRepository`, el almacén de consultas `DraftStore`,
//! el motor del ciclo de vida `DraftEngine` (publish / restore /
//! materialize) y el servicio tipado `DraftService` que usan las entidades
//! que implementan `DraftableEntity`. Incluye implementaciones en memoria
//! útiles para pruebas (`InMemoryDraftRepository`,
//! `InMemoryEntityRepository`).
//!
//! Diseño resumido:
//! - Un borrador es una fila independiente con el estado serializado de una
//!   entidad; la entidad viva no se toca hasta `publish` o `restore`.
//! - `publish` crea siempre una entidad nueva; `restore` sobrescribe la
//!   entidad indicada por `entity_id` y nunca crea identidad.
//! - El propietario es polimórfico (`OwnerRef`) y la forma en que se guarda
//!   y filtra la decide `OwnerPolicy`.
//! - No hay estado global: el propietario por defecto viaja en un
//!   `DraftScope`.
//!
//! Ejemplo rápido:
//! ```rust
//! use draft::stubs::{InMemoryDraftRepository, InMemoryEntityRepository};
//! use draft::{DraftEngine, DraftEngineConfig, EntityRegistry, Payload};
//! use std::sync::Arc;
//! let mut registry = EntityRegistry::new();
//! registry.register("article", Arc::new(InMemoryEntityRepository::new()));
//! let engine = DraftEngine::new(Arc::new(InMemoryDraftRepository::new()), registry, DraftEngineConfig::default());
//! let draft = engine.create_draft("article", None, Payload::new(), None, None).unwrap();
//! let published = engine.publish(&draft).unwrap();
//! assert!(published.is_published());
//! ```
pub mod clock;
pub mod domain;
pub mod engine;
pub mod entity;
pub mod errors;
pub mod registry;
pub mod repository;
pub mod service;
pub mod store;
pub mod stubs;

pub use clock::*;
pub use domain::*;
pub use engine::*;
pub use entity::*;
pub use errors::*;
pub use registry::*;
pub use repository::*;
pub use service::*;
pub use store::*;
pub use stubs::*;
