pub mod app_state;
pub mod console;

pub use app_state::AppState;
pub use console::run_console;
