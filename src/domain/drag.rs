use crate::domain::density::{DensityScale, RoundingMode};
use crate::domain::models::Block;
use crate::domain::overlap::resolve_overlap;
use crate::domain::slot_grid::CalendarSlotGrid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl LaneRect {
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x < self.left + self.width
            && point.y >= self.top
            && point.y < self.top + self.height
    }

    pub fn column_at(&self, x: f64, columns: usize) -> usize {
        if columns == 0 || self.width <= 0.0 {
            return 0;
        }
        let ratio = ((x - self.left) / self.width).clamp(0.0, 1.0);
        ((ratio * columns as f64).floor() as usize).min(columns - 1)
    }
}

pub trait LaneLayout {
    fn lane_at(&self, point: Point) -> Option<usize>;
    fn lane_rect(&self, day_index: usize) -> Option<LaneRect>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowLayout {
    pub left: f64,
    pub top: f64,
    pub lane_width: f64,
    pub lane_height: f64,
    pub lane_count: usize,
}

impl LaneLayout for RowLayout {
    fn lane_at(&self, point: Point) -> Option<usize> {
        if self.lane_height <= 0.0 || point.y < self.top {
            return None;
        }
        let index = ((point.y - self.top) / self.lane_height).floor() as usize;
        self.lane_rect(index)
            .filter(|rect| point.x >= rect.left && point.x < rect.left + rect.width)
            .map(|_| index)
    }

    fn lane_rect(&self, day_index: usize) -> Option<LaneRect> {
        (day_index < self.lane_count).then(|| LaneRect {
            left: self.left,
            top: self.top + day_index as f64 * self.lane_height,
            width: self.lane_width,
            height: self.lane_height,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragKind {
    Move,
    ResizeLeft,
    ResizeRight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub kind: DragKind,
    pub block_id: String,
    pub origin_start: i64,
    pub origin_len: i64,
    pub pointer_offset: i64,
    pub lane_rect: LaneRect,
    pub day_index: usize,
    pub moved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOutcome {
    pub block_id: String,
    pub moved: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotSpace<'a> {
    pub plan: &'a CalendarSlotGrid,
    pub view: &'a CalendarSlotGrid,
    pub scale: DensityScale,
}

impl SlotSpace<'_> {
    fn view_slot_at(&self, rect: &LaneRect, day_index: usize, x: f64) -> i64 {
        let columns = self.view.slots_per_day();
        (day_index * columns + rect.column_at(x, columns)) as i64
    }

    fn to_plan(&self, view_slot: i64) -> i64 {
        self.scale.convert_slot_index(
            view_slot,
            self.view.density(),
            self.plan.density(),
            RoundingMode::Floor,
        )
    }
}

#[derive(Debug, Default)]
pub struct DragMachine {
    state: Option<DragState>,
}

impl DragMachine {
    pub fn state(&self) -> Option<&DragState> {
        self.state.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    pub fn begin(
        &mut self,
        kind: DragKind,
        block: &Block,
        pointer: Point,
        space: &SlotSpace<'_>,
        layout: &dyn LaneLayout,
    ) -> bool {
        if self.state.is_some() || block.approved {
            return false;
        }
        let Some(day_index) = space.plan.day_of_slot(block.start) else {
            return false;
        };
        let Some(lane_rect) = layout.lane_rect(day_index) else {
            return false;
        };

        let pointer_offset = match kind {
            DragKind::Move => {
                let grabbed = space.to_plan(space.view_slot_at(&lane_rect, day_index, pointer.x));
                (grabbed - block.start).clamp(0, (block.len - 1).max(0))
            }
            DragKind::ResizeLeft | DragKind::ResizeRight => 0,
        };

        self.state = Some(DragState {
            kind,
            block_id: block.id.clone(),
            origin_start: block.start,
            origin_len: block.len,
            pointer_offset,
            lane_rect,
            day_index,
            moved: false,
        });
        true
    }

    pub fn update(
        &mut self,
        pointer: Point,
        current: &Block,
        lane_blocks: &[Block],
        space: &SlotSpace<'_>,
        layout: &dyn LaneLayout,
    ) -> Option<Block> {
        let state = self.state.as_mut()?;
        if state.block_id != current.id {
            return None;
        }

        let (day_index, lane_rect) = match state.kind {
            DragKind::Move => {
                let day_index = layout.lane_at(pointer)?;
                (day_index, layout.lane_rect(day_index)?)
            }
            DragKind::ResizeLeft | DragKind::ResizeRight => (state.day_index, state.lane_rect),
        };

        let view_slot = space.view_slot_at(&lane_rect, day_index, pointer.x);
        if !space.view.is_valid_slot(view_slot) {
            return None;
        }
        let pointer_slot = space.to_plan(view_slot);
        let (day_start, day_end) = space.plan.day_bounds(day_index)?;
        if day_end <= day_start {
            return None;
        }

        let origin_end = state.origin_start + state.origin_len;
        let mut candidate = current.clone();
        match state.kind {
            DragKind::Move => {
                candidate.start = clamp_between(
                    pointer_slot - state.pointer_offset,
                    day_start,
                    day_end - state.origin_len,
                );
                candidate.len = state.origin_len;
            }
            DragKind::ResizeLeft => {
                candidate.start = clamp_between(pointer_slot, day_start, origin_end - 1);
                candidate.len = origin_end - candidate.start;
            }
            DragKind::ResizeRight => {
                let end = clamp_between(pointer_slot + 1, state.origin_start + 1, day_end);
                candidate.start = state.origin_start;
                candidate.len = end - state.origin_start;
            }
        }

        let resolved = resolve_overlap(&candidate, lane_blocks, space.plan.slot_count());
        if state.kind == DragKind::Move {
            state.day_index = day_index;
            state.lane_rect = lane_rect;
        }
        if resolved.start == current.start && resolved.len == current.len {
            return None;
        }
        state.moved = true;
        Some(resolved)
    }

    pub fn release(&mut self) -> Option<DragOutcome> {
        self.finish(false)
    }

    pub fn cancel(&mut self) -> Option<DragOutcome> {
        self.finish(true)
    }

    fn finish(&mut self, cancelled: bool) -> Option<DragOutcome> {
        let state = self.state.take()?;
        Some(DragOutcome {
            block_id: state.block_id,
            moved: state.moved,
            cancelled,
        })
    }
}

fn clamp_between(value: i64, low: i64, high: i64) -> i64 {
    value.min(high).max(low)
}
