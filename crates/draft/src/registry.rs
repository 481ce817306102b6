// Archivo: registry.rs
// Propósito: mapa de clave de tipo -> repositorio de entidades. El motor
// resuelve aquí cómo materializar un snapshot a partir de su `entity_type`.
use crate::entity::Identifiable;
use crate::errors::{DraftError, Result};
use crate::repository::EntityRepository;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registro de colaboradores de persistencia por tipo de entidad.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    repositories: HashMap<String, Arc<dyn EntityRepository>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra (o reemplaza) el repositorio de `entity_type`.
    pub fn register(&mut self, entity_type: impl Into<String>, repo: Arc<dyn EntityRepository>) -> &mut Self {
        self.repositories.insert(entity_type.into(), repo);
        self
    }

    /// Variante tipada: registra bajo `T::type_key()`.
    pub fn with<T: Identifiable>(mut self, repo: Arc<dyn EntityRepository>) -> Self {
        self.register(T::type_key(), repo);
        self
    }

    pub fn resolve(&self, entity_type: &str) -> Result<Arc<dyn EntityRepository>> {
        self.repositories
            .get(entity_type)
            .cloned()
            .ok_or_else(|| DraftError::UnknownEntityType(entity_type.to_string()))
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.repositories.contains_key(entity_type)
    }

    /// Tipos registrados, ordenados.
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.repositories.keys().cloned().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry").field("entity_types", &self.entity_types()).finish()
    }
}
