use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::AppState;
use crate::{commands::Command, common::errors::CommandError, log_println};

/// Reads commands from stdin until EOF or `shutdown`, printing each reply.
pub async fn run_console(state: Arc<AppState>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed, console stopped");
                break;
            }
            Err(e) => {
                warn!("Failed to read from stdin: {}", e);
                break;
            }
        };

        if let Some(reply) = handle_line(&state, &line).await {
            log_println!("{}", reply);
        }
    }
}

async fn handle_line(state: &AppState, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let command: Command = match line.parse() {
        Ok(command) => command,
        Err(e) => return Some(render_error(&e)),
    };

    let req = state.console_request();
    Some(match state.dispatcher.dispatch(&req, command).await {
        Ok(reply) => reply,
        Err(e) => render_error(&e),
    })
}

fn render_error(e: &CommandError) -> String {
    format!("Error: {}", e)
}
