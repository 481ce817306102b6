use crate::domain_repository::InMemoryArticleRepository;
use crate::{Article, Author, DomainError};
use draft::{DraftEngineConfig, DraftScope, DraftService, EntityRegistry, EntityRepository, InMemoryDraftRepository};
use std::sync::Arc;

pub struct DomainStubs;

impl DomainStubs {
    /// Registro con el repositorio de artículos bajo `"article"`.
    pub fn registry(articles: Arc<dyn EntityRepository>) -> EntityRegistry {
        EntityRegistry::new().with::<Article>(articles)
    }

    /// Crea un servicio en memoria pre-populado: un artículo publicado y dos
    /// borradores sin publicar de autores distintos.
    pub fn sample_service(config: DraftEngineConfig)
                          -> Result<(DraftService<InMemoryDraftRepository>, Arc<InMemoryArticleRepository>), DomainError> {
        let articles = Arc::new(InMemoryArticleRepository::new());
        let service = DraftService::new(Arc::new(InMemoryDraftRepository::new()),
                                        Self::registry(articles.clone()),
                                        config);

        let ana = Author::new("1", "Ana")?;
        let luis = Author::new("2", "Luis")?;

        // Artículo ya persistido con su borrador publicado
        service.save_with_draft(&DraftScope::owned_by(ana.as_owner()),
                                Article::new("Bienvenida", "Primer artículo")?,
                                None,
                                None)?;

        // Borradores pendientes de revisión
        service.save_as_draft(&DraftScope::owned_by(ana.as_owner()),
                              Article::new("Notas de versión", "Pendiente")?,
                              None,
                              None)?;
        service.save_as_draft(&DraftScope::owned_by(luis.as_owner()),
                              Article::new("Guía rápida", "Borrador inicial")?,
                              None,
                              None)?;

        Ok((service, articles))
    }
}
