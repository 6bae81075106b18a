/// Database access layer and repositories
pub mod post_repo;
pub mod tag_repo;
