pub mod manager;
pub mod model;

pub use manager::ProjectManager;
pub use model::{Project, ProjectMeta, ServerDirName};
