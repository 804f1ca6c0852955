pub mod deliver;
pub mod pipeline;
pub mod session;
pub mod state;

pub use pipeline::Pipeline;
pub use session::StreamSession;
pub use state::{SessionOutcome, SessionShared, SessionState};
