mod article;
mod author;
mod domain_repository;
mod domain_stubs;
mod errors;

pub use article::Article;
pub use author::Author;
pub use domain_repository::InMemoryArticleRepository;
pub use domain_stubs::DomainStubs;
pub use errors::DomainError;
