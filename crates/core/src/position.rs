#![forbid(unsafe_code)]

//! Position arithmetic shared by every list operation.
//!
//! Nothing here touches storage: the engine reads the current bounds, asks
//! for a plan, then applies the sibling shift before the acting record's own
//! write.

use crate::config::AddNewAt;

/// Inclusive bulk shift over sibling positions. `to == None` means open-ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shift {
    pub from: i64,
    pub to: Option<i64>,
    pub delta: i64,
}

impl Shift {
    /// `position >= from` moves down one slot.
    pub fn increment_from(from: i64) -> Self {
        Self {
            from,
            to: None,
            delta: 1,
        }
    }

    /// `position > after` moves up one slot.
    pub fn decrement_after(after: i64) -> Self {
        Self {
            from: after.saturating_add(1),
            to: None,
            delta: -1,
        }
    }

    pub fn contains(&self, position: i64) -> bool {
        position >= self.from && self.to.is_none_or(|to| position <= to)
    }

    /// Rows are visited so that no intermediate value collides with a row
    /// that has not moved yet.
    pub fn visits_descending(&self) -> bool {
        self.delta > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovePlan {
    Unchanged,
    Move { target: i64, shift: Shift },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub position: i64,
    pub shift: Option<Shift>,
}

/// Result of a list operation as seen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Unchanged,
    Moved {
        from: Option<i64>,
        to: Option<i64>,
        shifted: usize,
    },
}

impl MoveOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, MoveOutcome::Unchanged)
    }
}

/// Lowest-positioned slot is `top`; `bottom < top` means the list is empty.
pub fn clamp(target: i64, top: i64, bottom: i64) -> i64 {
    target.max(top).min(bottom.max(top))
}

/// Plans moving a ranked record from `current` to `requested`.
///
/// `bottom` is the bottom of the relevant list and already accounts for the
/// record itself.
pub fn plan_move(current: i64, requested: i64, top: i64, bottom: i64) -> MovePlan {
    let target = clamp(requested, top, bottom.max(current));
    if target == current {
        return MovePlan::Unchanged;
    }
    let shift = if target < current {
        Shift {
            from: target,
            to: Some(current - 1),
            delta: 1,
        }
    } else {
        Shift {
            from: current + 1,
            to: Some(target),
            delta: -1,
        }
    };
    MovePlan::Move { target, shift }
}

/// Plans ranking a record that is not in the list yet at `requested`.
///
/// The slot may be one past the current bottom.
pub fn plan_insert_at(requested: i64, top: i64, relevant_bottom: i64) -> Placement {
    let position = clamp(requested, top, relevant_bottom.saturating_add(1));
    let shift = (position <= relevant_bottom).then(|| Shift::increment_from(position));
    Placement { position, shift }
}

/// Plans the initial position of a new record.
///
/// Default bottom placement uses the bottom of the full list while explicit
/// and top placement account only for relevant rows.
pub fn plan_create(
    requested: Option<i64>,
    policy: AddNewAt,
    top: i64,
    full_bottom: i64,
    relevant_bottom: i64,
) -> Option<Placement> {
    if let Some(requested) = requested {
        return Some(plan_insert_at(requested, top, relevant_bottom));
    }
    match policy {
        AddNewAt::Bottom => Some(Placement {
            position: full_bottom.max(top - 1).saturating_add(1),
            shift: None,
        }),
        AddNewAt::Top => Some(Placement {
            position: top,
            shift: (relevant_bottom >= top).then(|| Shift::increment_from(top)),
        }),
        AddNewAt::Disabled => None,
    }
}

/// Shift closing the gap left by a record leaving the list at `current`.
pub fn plan_removal(current: i64) -> Shift {
    Shift::decrement_after(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_targets_in_bounds() {
        assert_eq!(clamp(0, 1, 4), 1);
        assert_eq!(clamp(5, 1, 4), 4);
        assert_eq!(clamp(3, 1, 4), 3);
        assert_eq!(clamp(7, 1, 0), 1);
    }

    #[test]
    fn move_up_increments_the_skipped_range() {
        assert_eq!(
            plan_move(4, 2, 1, 4),
            MovePlan::Move {
                target: 2,
                shift: Shift {
                    from: 2,
                    to: Some(3),
                    delta: 1
                }
            }
        );
    }

    #[test]
    fn move_down_decrements_the_skipped_range() {
        assert_eq!(
            plan_move(2, 4, 1, 4),
            MovePlan::Move {
                target: 4,
                shift: Shift {
                    from: 3,
                    to: Some(4),
                    delta: -1
                }
            }
        );
    }

    #[test]
    fn out_of_range_moves_clamp() {
        assert_eq!(plan_move(1, 0, 1, 4), MovePlan::Unchanged);
        assert_eq!(plan_move(4, 5, 1, 4), MovePlan::Unchanged);
        assert!(matches!(
            plan_move(2, 99, 1, 4),
            MovePlan::Move { target: 4, .. }
        ));
        assert_eq!(plan_move(3, 3, 1, 4), MovePlan::Unchanged);
    }

    #[test]
    fn create_at_bottom_uses_full_bottom() {
        let placement = plan_create(None, AddNewAt::Bottom, 1, 5, 3).unwrap();
        assert_eq!(placement.position, 6);
        assert_eq!(placement.shift, None);

        let empty = plan_create(None, AddNewAt::Bottom, 1, 0, 0).unwrap();
        assert_eq!(empty.position, 1);
    }

    #[test]
    fn create_at_top_shifts_everything() {
        let placement = plan_create(None, AddNewAt::Top, 1, 4, 4).unwrap();
        assert_eq!(placement.position, 1);
        assert_eq!(placement.shift, Some(Shift::increment_from(1)));

        let empty = plan_create(None, AddNewAt::Top, 1, 0, 0).unwrap();
        assert_eq!(empty.shift, None);
    }

    #[test]
    fn explicit_create_position_wins_over_policy() {
        let placement = plan_create(Some(2), AddNewAt::Top, 1, 4, 4).unwrap();
        assert_eq!(placement.position, 2);
        assert_eq!(placement.shift, Some(Shift::increment_from(2)));

        let appended = plan_create(Some(9), AddNewAt::Bottom, 1, 4, 4).unwrap();
        assert_eq!(appended.position, 5);
        assert_eq!(appended.shift, None);

        assert_eq!(plan_create(None, AddNewAt::Disabled, 1, 4, 4), None);
    }

    #[test]
    fn removal_closes_the_gap_below() {
        let shift = plan_removal(2);
        assert!(!shift.contains(2));
        assert!(shift.contains(3));
        assert!(shift.contains(i64::MAX));
        assert_eq!(shift.delta, -1);
        assert!(!shift.visits_descending());
    }

    #[test]
    fn non_default_top_of_list() {
        assert_eq!(clamp(-3, 0, 2), 0);
        let placement = plan_create(None, AddNewAt::Bottom, 0, -1, -1).unwrap();
        assert_eq!(placement.position, 0);
    }
}
