pub mod catalog;
pub mod platform;

pub use catalog::{VersionCatalog, VersionDescriptor, DEFAULT_REGISTRY_URL};
pub use platform::Platform;
