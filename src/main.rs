use draft::{DraftEngineConfig, DraftListing, DraftScope, DraftService, OwnerPolicy};
use draft_domain::{Article, Author};
use draft_persistence::{DieselArticleRepository, DieselDraftRepository};
use log::info;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

type Service = DraftService<DieselDraftRepository>;

/// Pequeño menú interactivo para administrar borradores de artículos usando
/// los repositorios de `draft-persistence`.
///
/// Opciones soportadas:
/// 1) Ver borradores (tabla con id, estado y autor)
/// 2) Crear borrador de artículo
/// 3) Publicar borrador
/// 4) Restaurar borrador sobre su artículo
/// 5) Guardar artículo con borrador publicado
/// 6) Cambiar autor actual
/// 7) Anotar metadata en un borrador
/// 8) Ver artículos
/// 9) Salir
///
/// `DRAFT_OWNER_POLICY` (`typed_pair` | `id_only`) fija la política de
/// propietario.
fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let policy = match std::env::var("DRAFT_OWNER_POLICY") {
        Ok(v) => v.parse::<OwnerPolicy>()?,
        Err(_) => OwnerPolicy::default(),
    };
    // Inicializar pool (aplica migraciones embebidas si procede)
    let pool = draft_persistence::new_from_env()?;
    let (drafts, articles) = draft_persistence::repositories(pool);
    let articles = Arc::new(articles);
    let registry = draft::EntityRegistry::new().with::<Article>(articles.clone());
    let service: Service = DraftService::new(Arc::new(drafts), registry, DraftEngineConfig::with_owner_policy(policy));
    info!("draft-cli iniciado con política {}", policy);

    let mut scope = DraftScope::unowned();

    loop {
        println!("\n== Draft CLI menu ==");
        match scope.owner() {
            Some(o) => println!("Autor actual: {}", o),
            None => println!("Autor actual: <ninguno>"),
        }
        println!("1) Ver borradores");
        println!("2) Crear borrador de artículo");
        println!("3) Publicar borrador");
        println!("4) Restaurar borrador");
        println!("5) Guardar artículo con borrador");
        println!("6) Cambiar autor actual");
        println!("7) Anotar metadata en un borrador");
        println!("8) Ver artículos");
        println!("9) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        if io::stdin().read_line(&mut choice)? == 0 {
            break;
        }
        match choice.trim() {
            "1" => list_drafts(&service, &scope),
            "2" => {
                let title = prompt("Título: ")?;
                let body = prompt("Cuerpo: ")?;
                let article = match Article::new(title.trim(), body.trim()) {
                    Ok(a) => a,
                    Err(e) => { eprintln!("Artículo inválido: {}", e); continue; }
                };
                match service.save_as_draft(&scope, article, None, None) {
                    Ok(d) => println!("Borrador creado: {}", d.draft().map(|r| r.id.to_string()).unwrap_or_default()),
                    Err(e) => eprintln!("Error creando borrador: {}", e),
                }
            }
            "3" => {
                let Some(id) = prompt_uuid("Draft id a publicar (UUID): ")? else { continue };
                let result = service.get_draft::<Article>(&scope, &id)
                                    .and_then(|r| service.engine().materialize::<Article>(&r, true))
                                    .and_then(|d| service.publish(d));
                match result {
                    Ok(d) => println!("Publicado como artículo {}", d.id().unwrap_or("-")),
                    Err(e) => eprintln!("Error publicando: {}", e),
                }
            }
            "4" => {
                let Some(id) = prompt_uuid("Draft id a restaurar (UUID): ")? else { continue };
                let result = service.get_draft::<Article>(&scope, &id)
                                    .and_then(|r| service.engine().materialize::<Article>(&r, true))
                                    .and_then(|d| service.restore(d));
                match result {
                    Ok(d) => println!("Artículo {} restaurado: {}", d.id().unwrap_or("-"), d.title()),
                    Err(e) => eprintln!("Error restaurando: {}", e),
                }
            }
            "5" => {
                let id_s = prompt("Id de artículo existente (enter para nuevo): ")?;
                let mut article = if id_s.trim().is_empty() {
                    Article::default()
                } else {
                    match articles.get_article(id_s.trim()) {
                        Ok(Some(a)) => a,
                        Ok(None) => { eprintln!("Artículo no encontrado"); continue; }
                        Err(e) => { eprintln!("Error leyendo artículo: {}", e); continue; }
                    }
                };
                let title = prompt(&format!("Título [{}]: ", article.title()))?;
                if !title.trim().is_empty() {
                    if let Err(e) = article.set_title(title.trim()) {
                        eprintln!("Título inválido: {}", e);
                        continue;
                    }
                }
                let body = prompt("Cuerpo (enter para conservar): ")?;
                if !body.trim().is_empty() {
                    article.set_body(body.trim());
                }
                match service.save_with_draft(&scope, article, None, None) {
                    Ok(d) => println!("Artículo {} guardado (borrador {})",
                                      d.id().unwrap_or("-"),
                                      d.draft().map(|r| r.id.to_string()).unwrap_or_default()),
                    Err(e) => eprintln!("Error guardando artículo: {}", e),
                }
            }
            "6" => {
                let id = prompt("Id de autor (enter para ninguno): ")?;
                if id.trim().is_empty() {
                    scope.clear_owner();
                    println!("Sin autor");
                    continue;
                }
                let name = prompt("Nombre: ")?;
                match Author::new(id.trim(), name.trim()) {
                    Ok(a) => {
                        scope.set_owner(a.as_owner());
                        println!("Autor actual: {}", a.name());
                    }
                    Err(e) => eprintln!("Autor inválido: {}", e),
                }
            }
            "7" => {
                let Some(id) = prompt_uuid("Draft id (UUID): ")? else { continue };
                let key = prompt("Clave: ")?;
                let value_s = prompt("Valor (JSON o texto simple): ")?;
                let value = serde_json::from_str(value_s.trim()).unwrap_or(serde_json::json!(value_s.trim()));
                let result = service.get_draft::<Article>(&scope, &id)
                                    .and_then(|r| service.engine().set_data(&r, key.trim(), value));
                match result {
                    Ok(r) => println!("Metadata de {}: {}", r.id, serde_json::to_string(&r.metadata).unwrap_or_default()),
                    Err(e) => eprintln!("Error anotando borrador: {}", e),
                }
            }
            "8" => list_articles(&articles),
            "9" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn list_drafts(service: &Service, scope: &DraftScope) {
    match service.get_all_drafts::<Article>(scope, DraftListing::records()) {
        Ok(entries) => {
            println!("\nID                                   | ESTADO     | ARTÍCULO                             | AUTOR      | TÍTULO");
            println!("----------------------------------------------------------------------------------------------------------------");
            for r in entries.iter().filter_map(|e| e.record()) {
                let state = if r.is_published() { "publicado" } else { "borrador" };
                let entity = r.entity_id.clone().unwrap_or_else(|| "-".into());
                let owner = r.owner().map(|o| o.to_string()).unwrap_or_else(|| "-".into());
                let title = r.payload.get("title").and_then(|v| v.as_str()).unwrap_or("<sin título>");
                println!("{} | {:<10} | {:<36} | {:<10} | {}", r.id, state, entity, owner, title);
            }
        }
        Err(e) => eprintln!("Error listando borradores: {}", e),
    }
}

fn list_articles(articles: &DieselArticleRepository) {
    match articles.list_articles() {
        Ok(list) => {
            println!("\nID                                   | TÍTULO");
            println!("--------------------------------------------------------------");
            for a in list {
                println!("{} | {}", a.id().unwrap_or("-"), a.title());
            }
        }
        Err(e) => eprintln!("Error listando artículos: {}", e),
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}

fn prompt_uuid(msg: &str) -> io::Result<Option<Uuid>> {
    let s = prompt(msg)?;
    match Uuid::parse_str(s.trim()) {
        Ok(u) => Ok(Some(u)),
        Err(_) => {
            eprintln!("UUID inválido");
            Ok(None)
        }
    }
}
