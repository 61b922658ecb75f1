//! Final sprite → click target mapping.

use std::collections::HashMap;
use thiserror::Error;

use crate::captcha::matcher::MatchResult;
use crate::captcha::region::Centroid;

/// Why a set of matches cannot be clicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    #[error("sprite {sprite} has no candidate region")]
    Unmatched { sprite: usize },
    #[error("sprites {first} and {second} both resolved to ({centroid})")]
    Collision {
        first: usize,
        second: usize,
        centroid: Centroid,
    },
}

/// Click targets for sprites 1, 2 and 3, pairwise distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    targets: [Centroid; 3],
}

impl Assignment {
    /// Validates a match result. Sprite numbers in errors are 1-based.
    pub fn from_matches(matches: &MatchResult) -> Result<Self, AssignmentError> {
        let mut targets = [Centroid { x: 0, y: 0 }; 3];
        for (i, target) in targets.iter_mut().enumerate() {
            *target = matches
                .get(i)
                .map(|m| m.centroid)
                .ok_or(AssignmentError::Unmatched { sprite: i + 1 })?;
        }
        Self::new(targets)
    }

    /// Rejects targets where two sprites share a centroid.
    pub fn new(targets: [Centroid; 3]) -> Result<Self, AssignmentError> {
        let mut owners: HashMap<Centroid, usize> = HashMap::new();
        for (i, centroid) in targets.iter().enumerate() {
            if let Some(&first) = owners.get(centroid) {
                return Err(AssignmentError::Collision {
                    first,
                    second: i + 1,
                    centroid: *centroid,
                });
            }
            owners.insert(*centroid, i + 1);
        }
        Ok(Self { targets })
    }

    /// Targets in sprite order.
    pub fn targets(&self) -> &[Centroid; 3] {
        &self.targets
    }
}
