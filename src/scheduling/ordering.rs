use thiserror::Error;
use uuid::Uuid;

/// Spacing between consecutive positions after a renumber or an append.
pub const POSITION_GAP: i64 = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Job {0} is not in the moving job's zone and bucket")]
    AnchorNotInGroup(Uuid),

    #[error("A job cannot be placed relative to itself")]
    AnchorIsSelf,

    #[error("Jobs {prev} and {next} are not next to each other")]
    NotAdjacent { prev: Uuid, next: Uuid },

    #[error("Job {0} is not at the edge of its group; give both neighbours")]
    AnchorNotAtEdge(Uuid),

    #[error("Job {0} is not in the group being reordered")]
    NotInGroup(Uuid),
}

/// A position strictly between the two neighbours, or `None` when no integer
/// fits and the group has to be renumbered.
pub fn position_between(prev: Option<i64>, next: Option<i64>) -> Option<i64> {
    match (prev, next) {
        (None, None) => Some(POSITION_GAP),
        (Some(prev), None) => prev.checked_add(POSITION_GAP),
        (None, Some(next)) => next.checked_sub(POSITION_GAP),
        (Some(prev), Some(next)) => {
            let gap = next.checked_sub(prev)?;
            (gap >= 2).then(|| prev + gap / 2)
        }
    }
}

/// Position one gap past the last member, `None` when that would overflow.
pub fn end_of_group(positions: impl IntoIterator<Item = i64>) -> Option<i64> {
    match positions.into_iter().max() {
        Some(max) => max.checked_add(POSITION_GAP),
        None => Some(POSITION_GAP),
    }
}

/// Position writes that put `moving` last in `group`. `moving` may or may
/// not already be a member. Falls back to renumbering the whole group when
/// the last position leaves no room.
pub fn plan_append(group: &[(Uuid, i64)], moving: Uuid) -> Vec<(Uuid, i64)> {
    let mut order: Vec<(Uuid, i64)> = group
        .iter()
        .copied()
        .filter(|(id, _)| *id != moving)
        .collect();
    if let Some(position) = end_of_group(order.iter().map(|(_, p)| *p)) {
        return vec![(moving, position)];
    }
    order.push((moving, i64::MIN));
    renumber(&order)
}

/// Works out the position writes that put `moving` between `prev` and `next`.
///
/// `group` is the whole zone + bucket column, already sorted for display,
/// and must contain `moving`. A missing anchor means that side is the
/// column edge; missing both appends. Returns an empty plan when the job
/// is already there. When no integer fits, the whole column is renumbered
/// in its new order and only the rows whose value changed are returned.
pub fn plan_reorder(
    group: &[(Uuid, i64)],
    moving: Uuid,
    prev: Option<Uuid>,
    next: Option<Uuid>,
) -> Result<Vec<(Uuid, i64)>, ReorderError> {
    if prev == Some(moving) || next == Some(moving) {
        return Err(ReorderError::AnchorIsSelf);
    }
    let current_index = group
        .iter()
        .position(|(id, _)| *id == moving)
        .ok_or(ReorderError::NotInGroup(moving))?;

    let others: Vec<(Uuid, i64)> = group
        .iter()
        .copied()
        .filter(|(id, _)| *id != moving)
        .collect();
    let index_of = |anchor: Uuid| {
        others
            .iter()
            .position(|(id, _)| *id == anchor)
            .ok_or(ReorderError::AnchorNotInGroup(anchor))
    };

    let insert_at = match (prev, next) {
        (Some(prev), Some(next)) => {
            let prev_index = index_of(prev)?;
            let next_index = index_of(next)?;
            if next_index != prev_index + 1 {
                return Err(ReorderError::NotAdjacent { prev, next });
            }
            next_index
        }
        (Some(prev), None) => {
            let prev_index = index_of(prev)?;
            if prev_index + 1 != others.len() {
                return Err(ReorderError::AnchorNotAtEdge(prev));
            }
            others.len()
        }
        (None, Some(next)) => {
            if index_of(next)? != 0 {
                return Err(ReorderError::AnchorNotAtEdge(next));
            }
            0
        }
        (None, None) => others.len(),
    };

    if insert_at == current_index {
        return Ok(vec![]);
    }

    let before = insert_at.checked_sub(1).map(|i| others[i].1);
    let after = others.get(insert_at).map(|(_, position)| *position);
    if let Some(position) = position_between(before, after) {
        return Ok(vec![(moving, position)]);
    }

    let mut order = others;
    order.insert(insert_at, (moving, i64::MIN));
    Ok(renumber(&order))
}

/// Evenly re-spaces `order`, returning the entries whose position changed.
pub fn renumber(order: &[(Uuid, i64)]) -> Vec<(Uuid, i64)> {
    order
        .iter()
        .zip(1_i64..)
        .filter_map(|((id, old), rank)| {
            let new = rank * POSITION_GAP;
            (new != *old).then_some((*id, new))
        })
        .collect()
}
