use crate::domain::models::Block;
use crate::domain::slot_grid::CalendarSlotGrid;

// Greedy right push in start order, clamped into the horizon.
pub fn resolve_overlap(candidate: &Block, lane_blocks: &[Block], plan_slot_count: i64) -> Block {
    let mut resolved = candidate.clone();
    resolved.start = resolved.start.max(0);
    resolved.len = resolved.len.max(1);

    let mut others = lane_blocks
        .iter()
        .filter(|other| other.id != candidate.id)
        .collect::<Vec<_>>();
    others.sort_by(|left, right| left.start.cmp(&right.start).then_with(|| left.id.cmp(&right.id)));

    for other in others {
        if resolved.overlap_with(other) > 0 {
            resolved.start = other.end();
            resolved.len = fit_len(resolved.start, resolved.len, plan_slot_count);
        }
    }

    let last_slot = (plan_slot_count - 1).max(0);
    resolved.start = resolved.start.clamp(0, last_slot);
    resolved.len = fit_len(resolved.start, resolved.len, plan_slot_count);
    resolved
}

fn fit_len(start: i64, len: i64, plan_slot_count: i64) -> i64 {
    len.min(plan_slot_count - start).max(1)
}

pub fn place_on_grid(candidate: &Block, lane_blocks: &[Block], grid: &CalendarSlotGrid) -> Option<Block> {
    let slot_count = grid.slot_count();
    let mut attempt = candidate.clone();
    attempt.start = attempt.start.max(0);
    loop {
        let resolved = resolve_overlap(&attempt, lane_blocks, slot_count);
        let clear = lane_blocks
            .iter()
            .all(|other| other.id == resolved.id || resolved.overlap_with(other) == 0);
        if clear && grid.is_placeable(resolved.start, resolved.end()) {
            return Some(resolved);
        }
        let next = grid.next_valid_slot(resolved.start.max(attempt.start) + 1)?;
        attempt.start = next;
    }
}

pub fn is_disjoint(blocks: &[Block]) -> bool {
    let mut sorted = blocks.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|block| block.start);
    sorted.windows(2).all(|pair| pair[0].end() <= pair[1].start)
}
