use draft::errors::DraftError;
use draft::stubs::{InMemoryDraftRepository, InMemoryEntityRepository};
use draft::{DraftEngine, DraftEngineConfig, EntityRegistry, OwnerRef, Payload};
use serde_json::json;
use std::sync::Arc;

fn main() -> Result<(), DraftError> {
    // Registro con un único tipo de entidad y repo en memoria
    let pages = Arc::new(InMemoryEntityRepository::new());
    let mut registry = EntityRegistry::new();
    registry.register("page", pages.clone());
    let engine = DraftEngine::new(Arc::new(InMemoryDraftRepository::new()), registry, DraftEngineConfig::default());

    // Crear un borrador sin tocar la tabla de páginas
    let mut payload = Payload::new();
    payload.insert("title".into(), json!("Inicio"));
    payload.insert("body".into(), json!("Bienvenidos"));
    let draft = engine.create_draft("page", None, payload, Some(OwnerRef::typed("user", "1")), None)?;
    println!("draft {} creado, páginas vivas: {}", draft.id, pages.len()?);

    // Publicar: crea la página y marca el borrador
    let published = engine.publish(&draft)?;
    println!("publicado como página {:?} en {:?}", published.entity_id, published.published_at);

    // Anotar y listar
    let published = engine.set_data(&published, "revisado_por", json!("ana"))?;
    for r in engine.store().query("page", None).get()? {
        println!("{} publicado={} metadata={:?}", r.id, r.is_published(), r.metadata);
    }

    // Restaurar sobre la misma página (no crea otra)
    engine.restore(&published)?;
    println!("páginas vivas tras restore: {}", pages.len()?);
    Ok(())
}
