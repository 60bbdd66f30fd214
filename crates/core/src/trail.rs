use std::ops::Index;

use crate::lit::Lit;

/// The assigned literals in chronological order, partitioned into decision levels.
#[derive(Default)]
pub struct Trail {
    trail: Vec<Lit>,
    trail_delim: Vec<usize>,
}

impl Trail {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn enqueue(&mut self, lit: Lit) {
        self.trail.push(lit);
    }

    /// Open a new decision level.
    pub fn push(&mut self) {
        self.trail_delim.push(self.trail.len());
    }

    /// The number of open decision levels.
    pub fn decision_level(&self) -> usize {
        self.trail_delim.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.trail_delim.is_empty()
    }

    /// Remove all literals assigned above `decision_level`. The removed literals are yielded
    /// from newest to oldest.
    pub fn backtrack_to(&mut self, decision_level: usize) -> impl Iterator<Item = Lit> + '_ {
        let target_len = self
            .trail_delim
            .get(decision_level)
            .copied()
            .unwrap_or(self.trail.len());
        self.trail_delim.truncate(decision_level);

        self.trail.drain(target_len..).rev()
    }
}

impl Index<usize> for Trail {
    type Output = Lit;

    fn index(&self, index: usize) -> &Self::Output {
        &self.trail[index]
    }
}
