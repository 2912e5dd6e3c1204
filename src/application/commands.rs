use crate::application::bootstrap::bootstrap_workspace;
use crate::application::planner::{BlockDraft, BlockPatch, Placement, Planner, ViewBlock};
use crate::domain::calendar::{is_contiguous, DayTemplate};
use crate::domain::models::{Block, Density};
use crate::infrastructure::block_mapper::decode_calendar_days;
use crate::infrastructure::block_store::{BlockRepository, JsonFileBlockRepository};
use crate::infrastructure::calendar_store::InMemoryCalendarDayRepository;
use crate::infrastructure::config::save_config;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::logging::init_tracing;
use crate::infrastructure::save_queue::SaveQueue;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct AppState {
    config_dir: PathBuf,
    blocks_path: PathBuf,
    planner: Mutex<Planner>,
    save_worker: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub async fn open(
        workspace_root: PathBuf,
        first_day: NaiveDate,
        day_count: usize,
        actor: &str,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        init_tracing(&bootstrap.logs_dir)?;

        let calendar_store = Arc::new(open_calendar_store(
            &bootstrap.calendar_path,
            bootstrap.config.day_template(),
            first_day,
            day_count,
        )?);
        let block_store = Arc::new(JsonFileBlockRepository::new(&bootstrap.blocks_path));
        let planner = Planner::load(
            bootstrap.config.clone(),
            calendar_store,
            block_store.as_ref(),
            actor,
        )?;
        let (queue, worker) = SaveQueue::spawn(block_store);

        info!(
            workspace_root = %bootstrap.workspace_root.display(),
            blocks = planner.blocks().len(),
            "workspace opened"
        );
        Ok(Self {
            config_dir: bootstrap.config_dir,
            blocks_path: bootstrap.blocks_path,
            planner: Mutex::new(planner.with_save_queue(queue)),
            save_worker: Mutex::new(Some(worker)),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn blocks_path(&self) -> &Path {
        &self.blocks_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        error!(command, %error, "command failed");
        error.to_string()
    }

    pub async fn shutdown(&self) -> Result<(), InfraError> {
        let queue = lock_planner(self)?.take_save_queue();
        let worker = self
            .save_worker
            .lock()
            .map_err(|error| InfraError::Store(format!("save worker lock poisoned: {error}")))?
            .take();
        if let (Some(queue), Some(worker)) = (queue, worker) {
            queue.shutdown(worker).await;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum PlacementInput {
    Slots { start: i64, len: i64 },
    Times { start_at: String, end_at: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlanCommand {
    Create {
        item_id: String,
        placement: PlacementInput,
        #[serde(default)]
        amount: u64,
        #[serde(default)]
        memo: String,
    },
    Update {
        block_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        placement: Option<PlacementInput>,
        #[serde(default)]
        amount: Option<u64>,
        #[serde(default)]
        memo: Option<String>,
    },
    Delete {
        block_id: String,
    },
    Approve {
        block_ids: Vec<String>,
    },
    ListBlocks,
    ListViewBlocks,
    EnsureRange {
        from: String,
        to: String,
    },
    SetDensity {
        #[serde(default)]
        plan_density: Option<String>,
        #[serde(default)]
        view_density: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CommandOutcome {
    Created { block: Block },
    Updated { block: Block },
    Deleted { block_id: String },
    Approved { blocks: Vec<Block> },
    Blocks { blocks: Vec<Block> },
    ViewBlocks { blocks: Vec<ViewBlock> },
    RangeEnsured { extended: bool },
    DensityChanged { plan_density: Density, view_density: Density },
    Ignored,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DensityResponse {
    pub plan_density: Density,
    pub view_density: Density,
}

pub fn parse_plan_command(raw: &str) -> Result<PlanCommand, InfraError> {
    serde_json::from_str(raw)
        .map_err(|error| InfraError::InvalidInput(format!("invalid plan command: {error}")))
}

pub fn execute_plan_command(state: &AppState, command: PlanCommand) -> Result<CommandOutcome, InfraError> {
    match command {
        PlanCommand::Create {
            item_id,
            placement,
            amount,
            memo,
        } => {
            let created = create_block_impl(state, item_id, placement, amount, memo)?;
            Ok(created.map_or(CommandOutcome::Ignored, |block| CommandOutcome::Created { block }))
        }
        PlanCommand::Update {
            block_id,
            item_id,
            placement,
            amount,
            memo,
        } => {
            let patch = BlockPatch {
                item_id,
                amount,
                memo,
                placement: placement.as_ref().map(to_placement).transpose()?,
            };
            let updated = update_block_impl(state, block_id, patch)?;
            Ok(updated.map_or(CommandOutcome::Ignored, |block| CommandOutcome::Updated { block }))
        }
        PlanCommand::Delete { block_id } => {
            let deleted = delete_block_impl(state, block_id.clone())?;
            Ok(if deleted {
                CommandOutcome::Deleted {
                    block_id: block_id.trim().to_string(),
                }
            } else {
                CommandOutcome::Ignored
            })
        }
        PlanCommand::Approve { block_ids } => {
            let blocks = approve_blocks_impl(state, block_ids)?;
            Ok(if blocks.is_empty() {
                CommandOutcome::Ignored
            } else {
                CommandOutcome::Approved { blocks }
            })
        }
        PlanCommand::ListBlocks => Ok(CommandOutcome::Blocks {
            blocks: list_blocks_impl(state)?,
        }),
        PlanCommand::ListViewBlocks => Ok(CommandOutcome::ViewBlocks {
            blocks: list_view_blocks_impl(state)?,
        }),
        PlanCommand::EnsureRange { from, to } => Ok(CommandOutcome::RangeEnsured {
            extended: ensure_range_impl(state, from, to)?,
        }),
        PlanCommand::SetDensity {
            plan_density,
            view_density,
        } => {
            let response = set_density_impl(state, plan_density, view_density)?;
            Ok(CommandOutcome::DensityChanged {
                plan_density: response.plan_density,
                view_density: response.view_density,
            })
        }
    }
}

pub fn list_blocks_impl(state: &AppState) -> Result<Vec<Block>, InfraError> {
    let blocks = lock_planner(state)?.blocks();
    Ok(blocks.as_ref().clone())
}

pub fn list_view_blocks_impl(state: &AppState) -> Result<Vec<ViewBlock>, InfraError> {
    Ok(lock_planner(state)?.view_blocks())
}

pub fn create_block_impl(
    state: &AppState,
    item_id: String,
    placement: PlacementInput,
    amount: u64,
    memo: String,
) -> Result<Option<Block>, InfraError> {
    let placement = to_placement(&placement)?;
    let mut planner = lock_planner(state)?;
    Ok(planner.create_block(BlockDraft {
        item_id,
        placement,
        amount,
        memo,
    }))
}

pub fn update_block_impl(
    state: &AppState,
    block_id: String,
    patch: BlockPatch,
) -> Result<Option<Block>, InfraError> {
    let block_id = required_id(&block_id, "block_id")?;
    lock_planner(state)?.update_block(block_id, patch)
}

pub fn delete_block_impl(state: &AppState, block_id: String) -> Result<bool, InfraError> {
    let block_id = required_id(&block_id, "block_id")?;
    Ok(lock_planner(state)?.delete_block(block_id))
}

pub fn approve_blocks_impl(state: &AppState, block_ids: Vec<String>) -> Result<Vec<Block>, InfraError> {
    let block_ids = block_ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect::<Vec<_>>();
    if block_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(lock_planner(state)?.approve_blocks(&block_ids))
}

pub fn ensure_range_impl(state: &AppState, from: String, to: String) -> Result<bool, InfraError> {
    let from = parse_date_input(&from, "from")?;
    let to = parse_date_input(&to, "to")?;
    if to < from {
        return Err(InfraError::InvalidInput("to must not be before from".to_string()));
    }
    lock_planner(state)?.ensure_range(from, to)
}

pub fn set_density_impl(
    state: &AppState,
    plan_density: Option<String>,
    view_density: Option<String>,
) -> Result<DensityResponse, InfraError> {
    let plan_density = plan_density
        .as_deref()
        .map(|value| parse_density_input(value, "plan_density"))
        .transpose()?;
    let view_density = view_density
        .as_deref()
        .map(|value| parse_density_input(value, "view_density"))
        .transpose()?;

    let mut planner = lock_planner(state)?;
    if let Some(density) = plan_density {
        planner.set_plan_density(density);
    }
    if let Some(density) = view_density {
        planner.set_view_density(density);
    }
    save_config(state.config_dir(), planner.config())?;
    Ok(DensityResponse {
        plan_density: planner.plan_grid().density(),
        view_density: planner.view_grid().density(),
    })
}

pub fn read_saved_blocks(state: &AppState) -> Result<Vec<Block>, InfraError> {
    JsonFileBlockRepository::new(state.blocks_path()).load_blocks()
}

fn open_calendar_store(
    calendar_path: &Path,
    template: DayTemplate,
    first_day: NaiveDate,
    day_count: usize,
) -> Result<InMemoryCalendarDayRepository, InfraError> {
    if calendar_path.exists() {
        let raw = fs::read_to_string(calendar_path)?;
        let days = decode_calendar_days(&serde_json::from_str(&raw)?)?;
        if !days.is_empty() && is_contiguous(&days) {
            return Ok(InMemoryCalendarDayRepository::new(template, days));
        }
        warn!(path = %calendar_path.display(), "ignoring empty or non-contiguous calendar file");
    }
    Ok(InMemoryCalendarDayRepository::seeded(template, first_day, day_count))
}

fn lock_planner(state: &AppState) -> Result<MutexGuard<'_, Planner>, InfraError> {
    state
        .planner
        .lock()
        .map_err(|error| InfraError::Store(format!("planner lock poisoned: {error}")))
}

fn required_id<'a>(value: &'a str, field_name: &str) -> Result<&'a str, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::InvalidInput(format!("{field_name} must not be empty")));
    }
    Ok(value)
}

fn to_placement(input: &PlacementInput) -> Result<Placement, InfraError> {
    match input {
        PlacementInput::Slots { start, len } => Ok(Placement::Slots {
            start: *start,
            len: *len,
        }),
        PlacementInput::Times { start_at, end_at } => {
            let start_at = parse_rfc3339_input(start_at, "start_at")?;
            let end_at = parse_rfc3339_input(end_at, "end_at")?;
            if end_at <= start_at {
                return Err(InfraError::InvalidInput(
                    "end_at must be after start_at".to_string(),
                ));
            }
            Ok(Placement::Times { start_at, end_at })
        }
    }
}

fn parse_rfc3339_input(value: &str, field_name: &str) -> Result<DateTime<FixedOffset>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|error| {
        InfraError::InvalidInput(format!("{field_name} must be RFC3339 date-time: {error}"))
    })
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidInput(format!("{field_name} must be YYYY-MM-DD: {error}"))
    })
}

fn parse_density_input(value: &str, field_name: &str) -> Result<Density, InfraError> {
    value
        .parse::<Density>()
        .map_err(|error| InfraError::InvalidInput(format!("{field_name}: {error}")))
}
