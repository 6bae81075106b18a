/// Post Service Library
///
/// Handles post creation and retrieval for the Pulse social platform. The
/// center of the service is the content-submission pipeline: validate mixed
/// multipart/JSON input, classify and upload media attachments, maintain the
/// tag registry, and commit the post as one unit of work.
///
/// # Modules
///
/// - `handlers`: Post-related HTTP request handlers
/// - `models`: Data structures for posts, tags and views
/// - `services`: Business logic layer (submission pipeline, media policy)
/// - `db`: Database access layer and repositories
/// - `storage`: Object storage gateway for media attachments
/// - `middleware`: Caller identity extraction
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, Result};
