mod session_supervisor;

pub use session_supervisor::{SessionSupervisor, StartReport};
