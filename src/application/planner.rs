use crate::domain::calendar::{missing_days_after, missing_days_before};
use crate::domain::density::{DensityScale, RoundingMode};
use crate::domain::drag::{DragKind, DragMachine, DragOutcome, DragState, LaneLayout, Point, SlotSpace};
use crate::domain::models::{Block, CalendarDay, Density};
use crate::domain::overlap::{is_disjoint, place_on_grid};
use crate::domain::slot_grid::CalendarSlotGrid;
use crate::infrastructure::block_store::BlockRepository;
use crate::infrastructure::calendar_store::CalendarDayRepository;
use crate::infrastructure::config::PlannerConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::save_queue::SaveQueue;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Slots { start: i64, len: i64 },
    Times {
        start_at: DateTime<FixedOffset>,
        end_at: DateTime<FixedOffset>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDraft {
    pub item_id: String,
    pub placement: Placement,
    pub amount: u64,
    pub memo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPatch {
    pub item_id: Option<String>,
    pub amount: Option<u64>,
    pub memo: Option<String>,
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewBlock {
    pub id: String,
    pub item_id: String,
    pub start: i64,
    pub len: i64,
    pub approved: bool,
}

pub struct Planner {
    config: PlannerConfig,
    zone: Tz,
    actor: String,
    days: Arc<Vec<CalendarDay>>,
    blocks: Arc<Vec<Block>>,
    plan_grid: CalendarSlotGrid,
    view_grid: CalendarSlotGrid,
    scale: DensityScale,
    drag: DragMachine,
    calendar_store: Arc<dyn CalendarDayRepository>,
    save_queue: Option<SaveQueue>,
}

impl Planner {
    pub fn new(
        config: PlannerConfig,
        calendar_store: Arc<dyn CalendarDayRepository>,
        blocks: Vec<Block>,
        actor: &str,
    ) -> Result<Self, InfraError> {
        config.validate()?;
        let zone = config.zone()?;
        let days = calendar_store.list_days()?;
        let plan_grid = CalendarSlotGrid::build(&days, config.plan_density, zone);
        let view_grid = CalendarSlotGrid::build(&days, config.view_density, zone);
        let scale = DensityScale::from_days(&days);

        let reindexed = blocks
            .into_iter()
            .map(|block| reindex_block(block, &plan_grid, |start, len| (start, len)))
            .collect::<Vec<_>>();
        let blocks = match reflow(reindexed.clone(), &plan_grid) {
            Some(blocks) => blocks,
            None => {
                warn!(blocks = reindexed.len(), "loaded blocks do not fit the calendar; keeping them as stored");
                reindexed
            }
        };
        let blocks = blocks
            .into_iter()
            .map(|block| with_timestamps(block, &plan_grid))
            .collect::<Vec<_>>();

        info!(
            days = days.len(),
            blocks = blocks.len(),
            plan_density = %config.plan_density,
            view_density = %config.view_density,
            "planner session opened"
        );

        Ok(Self {
            config,
            zone,
            actor: actor.trim().to_string(),
            days: Arc::new(days),
            blocks: Arc::new(blocks),
            plan_grid,
            view_grid,
            scale,
            drag: DragMachine::default(),
            calendar_store,
            save_queue: None,
        })
    }

    pub fn load(
        config: PlannerConfig,
        calendar_store: Arc<dyn CalendarDayRepository>,
        block_store: &dyn BlockRepository,
        actor: &str,
    ) -> Result<Self, InfraError> {
        let blocks = block_store.load_blocks()?;
        Self::new(config, calendar_store, blocks, actor)
    }

    pub fn with_save_queue(mut self, queue: SaveQueue) -> Self {
        self.save_queue = Some(queue);
        self
    }

    pub fn take_save_queue(&mut self) -> Option<SaveQueue> {
        self.save_queue.take()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn set_actor(&mut self, actor: &str) {
        self.actor = actor.trim().to_string();
    }

    pub fn days(&self) -> Arc<Vec<CalendarDay>> {
        Arc::clone(&self.days)
    }

    pub fn blocks(&self) -> Arc<Vec<Block>> {
        Arc::clone(&self.blocks)
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == block_id)
    }

    pub fn plan_grid(&self) -> &CalendarSlotGrid {
        &self.plan_grid
    }

    pub fn view_grid(&self) -> &CalendarSlotGrid {
        &self.view_grid
    }

    pub fn scale(&self) -> DensityScale {
        self.scale
    }

    pub fn drag_state(&self) -> Option<&DragState> {
        self.drag.state()
    }

    pub fn view_blocks(&self) -> Vec<ViewBlock> {
        let plan = self.plan_grid.density();
        let view = self.view_grid.density();
        self.blocks
            .iter()
            .map(|block| ViewBlock {
                id: block.id.clone(),
                item_id: block.item_id.clone(),
                start: self
                    .scale
                    .convert_slot_index(block.start, plan, view, RoundingMode::Floor),
                len: self.scale.convert_slot_length(block.len, plan, view),
                approved: block.approved,
            })
            .collect()
    }

    pub fn set_view_density(&mut self, density: Density) {
        if density == self.view_grid.density() {
            return;
        }
        self.abort_drag("view density changed");
        self.config.view_density = density;
        self.view_grid = CalendarSlotGrid::build(&self.days, density, self.zone);
        debug!(%density, "view density changed");
    }

    pub fn set_plan_density(&mut self, density: Density) -> bool {
        let previous = self.plan_grid.density();
        if density == previous {
            return true;
        }
        let plan_grid = CalendarSlotGrid::build(&self.days, density, self.zone);
        let scale = self.scale;
        let reindexed = self
            .blocks
            .iter()
            .cloned()
            .map(|block| {
                reindex_block(block, &plan_grid, |start, len| {
                    (
                        scale.convert_slot_index(start, previous, density, RoundingMode::Floor),
                        scale.convert_slot_length(len, previous, density),
                    )
                })
            })
            .collect();
        let Some(blocks) = reflow(reindexed, &plan_grid) else {
            warn!(from = %previous, to = %density, "blocks do not fit at the new density");
            return false;
        };

        self.abort_drag("plan density changed");
        self.config.plan_density = density;
        self.plan_grid = plan_grid;
        info!(from = %previous, to = %density, "plan density changed");
        self.commit(blocks);
        true
    }

    pub fn ensure_range(&mut self, from: NaiveDate, to: NaiveDate) -> Result<bool, InfraError> {
        let chunk = self.config.extend_days.max(1);
        let mut days = self.days.as_ref().clone();
        let mut prepended = 0usize;

        let before = missing_days_before(&days, from);
        if before > 0 {
            let count = before.div_ceil(chunk) * chunk;
            if let Some(first) = days.first().map(|day| day.date) {
                days = self.calendar_store.prepend_days(first, count)?;
                prepended = count;
            }
        }
        let after = missing_days_after(&days, to);
        let mut appended = 0usize;
        if after > 0 {
            let count = after.div_ceil(chunk) * chunk;
            if let Some(last) = days.last().map(|day| day.date) {
                days = self.calendar_store.append_days(last, count)?;
                appended = count;
            }
        }
        if prepended == 0 && appended == 0 {
            return Ok(false);
        }

        if !self.replace_calendar(days, prepended) {
            return Err(InfraError::Store(
                "calendar extension would displace existing blocks".to_string(),
            ));
        }
        info!(prepended, appended, days = self.days.len(), "calendar extended");
        Ok(true)
    }

    pub fn replace_calendar(&mut self, days: Vec<CalendarDay>, prepended: usize) -> bool {
        let old_slots_per_day = self.plan_grid.slots_per_day();
        let plan_grid = CalendarSlotGrid::build(&days, self.plan_grid.density(), self.zone);
        let new_slots_per_day = plan_grid.slots_per_day();
        let reindexed = self
            .blocks
            .iter()
            .cloned()
            .map(|block| {
                reindex_block(block, &plan_grid, |start, len| {
                    (
                        shift_ordinal(start, old_slots_per_day, new_slots_per_day, prepended),
                        len,
                    )
                })
            })
            .collect();
        let Some(blocks) = reflow(reindexed, &plan_grid) else {
            warn!(days = days.len(), "blocks do not fit the new calendar");
            return false;
        };

        self.abort_drag("calendar replaced");
        self.view_grid = CalendarSlotGrid::build(&days, self.view_grid.density(), self.zone);
        self.scale = DensityScale::from_days(&days);
        self.plan_grid = plan_grid;
        self.days = Arc::new(days);
        self.commit(blocks);
        true
    }

    pub fn create_block(&mut self, draft: BlockDraft) -> Option<Block> {
        let (start, len) = self.resolve_placement(&draft.placement)?;
        let candidate = Block {
            id: next_id("blk"),
            item_id: draft.item_id.trim().to_string(),
            start,
            len,
            amount: draft.amount,
            memo: draft.memo,
            approved: false,
            start_at: None,
            end_at: None,
            created_by: Some(self.actor.clone()),
            updated_by: Some(self.actor.clone()),
        };
        let Some(resolved) = place_on_grid(&candidate, &self.blocks, &self.plan_grid) else {
            warn!(item_id = %candidate.item_id, "no room left on the horizon for new block");
            return None;
        };
        let resolved = with_timestamps(resolved, &self.plan_grid);

        let mut blocks = self.blocks.as_ref().clone();
        blocks.push(resolved.clone());
        info!(block_id = %resolved.id, start = resolved.start, len = resolved.len, "block created");
        self.commit(blocks);
        Some(resolved)
    }

    pub fn update_block(&mut self, block_id: &str, patch: BlockPatch) -> Result<Option<Block>, InfraError> {
        let block_id = block_id.trim();
        let current = self
            .block(block_id)
            .cloned()
            .ok_or_else(|| InfraError::NotFound(format!("block not found: {block_id}")))?;
        if current.approved {
            debug!(block_id, "ignoring update of approved block");
            return Ok(None);
        }

        let mut candidate = current.clone();
        if let Some(placement) = &patch.placement {
            let Some((start, len)) = self.resolve_placement(placement) else {
                debug!(block_id, "ignoring update with unresolvable placement");
                return Ok(None);
            };
            candidate.start = start;
            candidate.len = len;
        }
        if let Some(item_id) = patch.item_id {
            candidate.item_id = item_id.trim().to_string();
        }
        if let Some(amount) = patch.amount {
            candidate.amount = amount;
        }
        if let Some(memo) = patch.memo {
            candidate.memo = memo;
        }
        candidate.updated_by = Some(self.actor.clone());

        let Some(resolved) = place_on_grid(&candidate, &self.blocks, &self.plan_grid) else {
            warn!(block_id, "no room left on the horizon for updated block");
            return Ok(None);
        };
        let resolved = with_timestamps(resolved, &self.plan_grid);
        let blocks = self.replaced(&resolved);
        info!(block_id, start = resolved.start, len = resolved.len, "block updated");
        self.commit(blocks);
        Ok(Some(resolved))
    }

    pub fn delete_block(&mut self, block_id: &str) -> bool {
        let block_id = block_id.trim();
        match self.block(block_id) {
            Some(block) if !block.approved => {}
            _ => return false,
        }
        let blocks = self
            .blocks
            .iter()
            .filter(|block| block.id != block_id)
            .cloned()
            .collect();
        info!(block_id, "block deleted");
        self.commit(blocks);
        true
    }

    pub fn approve_blocks(&mut self, block_ids: &[String]) -> Vec<Block> {
        let mut approved = Vec::new();
        let blocks = self
            .blocks
            .iter()
            .cloned()
            .map(|mut block| {
                if !block.approved && block_ids.iter().any(|id| id.trim() == block.id) {
                    block.approved = true;
                    block.updated_by = Some(self.actor.clone());
                    approved.push(block.clone());
                }
                block
            })
            .collect();
        if !approved.is_empty() {
            info!(count = approved.len(), "blocks approved");
            self.commit(blocks);
        }
        approved
    }

    pub fn begin_drag(
        &mut self,
        kind: DragKind,
        block_id: &str,
        pointer: Point,
        layout: &dyn LaneLayout,
    ) -> bool {
        let Some(block) = self.block(block_id).cloned() else {
            return false;
        };
        let space = SlotSpace {
            plan: &self.plan_grid,
            view: &self.view_grid,
            scale: self.scale,
        };
        let started = self.drag.begin(kind, &block, pointer, &space, layout);
        if started {
            debug!(block_id, ?kind, "drag started");
        }
        started
    }

    pub fn drag_to(&mut self, pointer: Point, layout: &dyn LaneLayout) -> Option<Block> {
        let block_id = self.drag.state()?.block_id.clone();
        let current = self.block(&block_id)?.clone();
        let space = SlotSpace {
            plan: &self.plan_grid,
            view: &self.view_grid,
            scale: self.scale,
        };
        let frame = self
            .drag
            .update(pointer, &current, &self.blocks, &space, layout)?;
        let resolved = place_on_grid(&frame, &self.blocks, &self.plan_grid)?;
        let resolved = with_timestamps(resolved, &self.plan_grid);
        let blocks = self.replaced(&resolved);
        self.commit(blocks);
        Some(resolved)
    }

    pub fn release_drag(&mut self) -> Option<DragOutcome> {
        let outcome = self.drag.release()?;
        self.stamp_after_drag(&outcome);
        Some(outcome)
    }

    pub fn cancel_drag(&mut self) -> Option<DragOutcome> {
        let outcome = self.drag.cancel()?;
        self.stamp_after_drag(&outcome);
        Some(outcome)
    }

    fn stamp_after_drag(&mut self, outcome: &DragOutcome) {
        debug!(
            block_id = %outcome.block_id,
            moved = outcome.moved,
            cancelled = outcome.cancelled,
            "drag finished"
        );
        if !outcome.moved {
            return;
        }
        let Some(mut block) = self.block(&outcome.block_id).cloned() else {
            return;
        };
        block.updated_by = Some(self.actor.clone());
        let blocks = self.replaced(&block);
        info!(block_id = %block.id, start = block.start, len = block.len, "block moved");
        self.commit(blocks);
    }

    fn abort_drag(&mut self, reason: &str) {
        if let Some(outcome) = self.drag.cancel() {
            debug!(block_id = %outcome.block_id, reason, "drag aborted");
            self.stamp_after_drag(&outcome);
        }
    }

    fn resolve_placement(&self, placement: &Placement) -> Option<(i64, i64)> {
        match placement {
            Placement::Slots { start, len } => self
                .plan_grid
                .is_valid_slot(*start)
                .then_some((*start, (*len).max(1))),
            Placement::Times { start_at, end_at } => {
                let start = self.plan_grid.slot_index_from_datetime(start_at, false)?;
                let end = self.plan_grid.slot_index_from_datetime(end_at, true)?;
                (end > start).then_some((start, end - start))
            }
        }
    }

    fn replaced(&self, updated: &Block) -> Vec<Block> {
        self.blocks
            .iter()
            .map(|block| {
                if block.id == updated.id {
                    updated.clone()
                } else {
                    block.clone()
                }
            })
            .collect()
    }

    fn commit(&mut self, blocks: Vec<Block>) {
        let blocks = blocks
            .into_iter()
            .map(|block| with_timestamps(block, &self.plan_grid))
            .collect::<Vec<_>>();
        self.blocks = Arc::new(blocks);
        if let Some(queue) = &self.save_queue {
            queue.publish(Arc::clone(&self.blocks));
        }
    }
}

// Placed blocks always resolve; only blocks kept as stored on load may not,
// and those keep their stored timestamps untouched.
fn with_timestamps(mut block: Block, grid: &CalendarSlotGrid) -> Block {
    if let (Some(start_at), Some(end_at)) = (
        grid.slot_to_datetime(block.start),
        grid.slot_boundary_to_datetime(block.end()),
    ) {
        block.start_at = Some(start_at.fixed_offset());
        block.end_at = Some(end_at.fixed_offset());
    }
    block
}

// Approved blocks stay where they are; the rest are settled in start order
// against everything placed before them.
fn reflow(blocks: Vec<Block>, grid: &CalendarSlotGrid) -> Option<Vec<Block>> {
    let (mut placed, mut movable): (Vec<Block>, Vec<Block>) =
        blocks.into_iter().partition(|block| block.approved);
    if !is_disjoint(&placed) || placed.iter().any(|block| !grid.is_placeable(block.start, block.end())) {
        return None;
    }
    movable.sort_by(|left, right| left.start.cmp(&right.start).then_with(|| left.id.cmp(&right.id)));
    for block in movable {
        let settled = place_on_grid(&block, &placed, grid)?;
        placed.push(settled);
    }
    placed.sort_by(|left, right| left.start.cmp(&right.start).then_with(|| left.id.cmp(&right.id)));
    Some(placed)
}

fn reindex_block(
    mut block: Block,
    grid: &CalendarSlotGrid,
    fallback: impl Fn(i64, i64) -> (i64, i64),
) -> Block {
    let start = block
        .start_at
        .and_then(|start_at| grid.slot_index_from_datetime(&start_at, false));
    let end = block
        .end_at
        .and_then(|end_at| grid.slot_index_from_datetime(&end_at, true));
    let (start, len) = match (start, end) {
        (Some(start), Some(end)) if end > start => (start, end - start),
        _ => fallback(block.start, block.len),
    };
    block.start = start.max(0);
    block.len = len.max(1);
    block
}

fn shift_ordinal(start: i64, old_slots_per_day: usize, new_slots_per_day: usize, prepended: usize) -> i64 {
    if old_slots_per_day == 0 {
        return start + (prepended * new_slots_per_day) as i64;
    }
    let old = old_slots_per_day as i64;
    let day = start.div_euclid(old) + prepended as i64;
    day * new_slots_per_day as i64 + start.rem_euclid(old)
}
