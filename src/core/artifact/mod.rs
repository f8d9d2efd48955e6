pub mod cache;

pub use cache::{ArtifactCache, ArtifactKey};
