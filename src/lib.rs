pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{execute_plan_command, parse_plan_command, AppState};
use chrono::Utc;
use domain::slot_grid::DEFAULT_ZONE;
use infrastructure::error::InfraError;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub use application::planner::{BlockDraft, BlockPatch, Placement, Planner, ViewBlock};
pub use domain::models::{Block, CalendarDay, Density};

const INITIAL_DAYS: usize = 28;

pub async fn run(workspace_root: PathBuf, actor: &str) -> Result<(), InfraError> {
    let first_day = Utc::now().with_timezone(&DEFAULT_ZONE).date_naive();
    let state = AppState::open(workspace_root, first_day, INITIAL_DAYS, actor).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match parse_plan_command(&line).and_then(|command| execute_plan_command(&state, command)) {
            Ok(outcome) => serde_json::to_value(outcome)?,
            Err(error) => serde_json::json!({
                "status": "error",
                "message": state.command_error("plan_command", &error),
            }),
        };
        stdout.write_all(format!("{response}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    state.shutdown().await
}
