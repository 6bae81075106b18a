/// Business logic layer
pub mod media;
pub mod posts;

pub use media::MediaPolicy;
pub use posts::PostService;
