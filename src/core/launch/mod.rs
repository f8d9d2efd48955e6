pub mod console;
pub mod supervisor;

pub use console::{ConsoleBridge, ConsoleBuffer, DEFAULT_DRAIN_LINES};
pub use supervisor::{next_state, ProcessSupervisor, SupervisorState};
