pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::artifact::{ArtifactCache, ArtifactKey};
pub use crate::core::error::{ManagerError, ManagerResult};
pub use crate::core::launch::{
    ConsoleBridge, ConsoleBuffer, ProcessSupervisor, SupervisorState, DEFAULT_DRAIN_LINES,
};
pub use crate::core::project::{Project, ProjectManager, ProjectMeta, ServerDirName};
pub use crate::core::registry::{Platform, VersionCatalog, VersionDescriptor};
pub use crate::core::state::{AppState, ManagerSettings};

/// Initialize structured logging for a bench shell.
///
/// Honors `RUST_LOG` when set; falls back to info with debug output
/// for this crate. Call once at startup.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,paperbench=debug")),
        )
        .init();
}
