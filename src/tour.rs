use serde::{Deserialize, Serialize};

/// Index of a stop: 0 is the agent's start, `i` is the `i-1`th target.
pub type StopId = usize;

pub const AGENT: StopId = 0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TourPolicy {
    /// Agent -> targets, ends at the last target.
    #[default]
    Open,
    /// Same, plus a final leg back to the agent's start.
    Closed,
}

/// A visiting order of all targets along with its total cost.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Tour {
    pub order: Vec<StopId>,
    pub cost: f64,
}

impl Tour {
    pub fn is_feasible(&self) -> bool {
        self.cost.is_finite()
    }
}

/// Consecutive (from, to) stops of a tour, starting at the agent.
pub fn tour_legs(order: &[StopId], policy: TourPolicy) -> Vec<(StopId, StopId)> {
    let mut legs = Vec::with_capacity(order.len() + 1);
    let mut current = AGENT;
    for &next in order {
        legs.push((current, next));
        current = next;
    }
    if policy == TourPolicy::Closed && !order.is_empty() {
        legs.push((current, AGENT));
    }
    legs
}

/// Whether `order` holds every target id in 1..=num_targets exactly once.
pub fn is_permutation(order: &[StopId], num_targets: usize) -> bool {
    if order.len() != num_targets {
        return false;
    }
    let mut seen = vec![false; num_targets + 1];
    for &stop in order {
        if stop == AGENT || stop > num_targets || seen[stop] {
            return false;
        }
        seen[stop] = true;
    }
    true
}
