use crate::{lit::Var, storage::KeyedVec};

/// A binary max-heap of variables, ordered by an external activity score. The position of every
/// variable in the heap is tracked, so the key of a contained variable can be increased in place.
#[derive(Default)]
pub struct VarHeap {
    heap: Vec<Var>,
    positions: KeyedVec<Var, Option<usize>>,
}

impl VarHeap {
    pub fn grow_to(&mut self, var: Var) {
        self.positions.grow_to(var);
    }

    pub fn contains(&self, var: Var) -> bool {
        self.positions[var].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn insert(&mut self, var: Var, activity: &KeyedVec<Var, f64>) {
        if self.contains(var) {
            return;
        }

        self.heap.push(var);
        let idx = self.heap.len() - 1;
        self.positions[var] = Some(idx);
        self.sift_up(idx, activity);
    }

    /// Restore the heap property after the activity of `var` was increased.
    pub fn increased(&mut self, var: Var, activity: &KeyedVec<Var, f64>) {
        if let Some(idx) = self.positions[var] {
            self.sift_up(idx, activity);
        }
    }

    pub fn pop_max(&mut self, activity: &KeyedVec<Var, f64>) -> Option<Var> {
        let top = *self.heap.first()?;
        let last = self.heap.pop().expect("heap is non-empty");
        self.positions[top] = None;

        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.positions[last] = Some(0);
            self.sift_down(0, activity);
        }

        Some(top)
    }

    fn sift_up(&mut self, mut idx: usize, activity: &KeyedVec<Var, f64>) {
        let var = self.heap[idx];

        while idx > 0 {
            let parent = (idx - 1) / 2;
            if activity[self.heap[parent]] >= activity[var] {
                break;
            }

            self.heap[idx] = self.heap[parent];
            self.positions[self.heap[idx]] = Some(idx);
            idx = parent;
        }

        self.heap[idx] = var;
        self.positions[var] = Some(idx);
    }

    fn sift_down(&mut self, mut idx: usize, activity: &KeyedVec<Var, f64>) {
        let var = self.heap[idx];

        loop {
            let left = 2 * idx + 1;
            if left >= self.heap.len() {
                break;
            }

            let right = left + 1;
            let child = if right < self.heap.len()
                && activity[self.heap[right]] > activity[self.heap[left]]
            {
                right
            } else {
                left
            };

            if activity[self.heap[child]] <= activity[var] {
                break;
            }

            self.heap[idx] = self.heap[child];
            self.positions[self.heap[idx]] = Some(idx);
            idx = child;
        }

        self.heap[idx] = var;
        self.positions[var] = Some(idx);
    }
}
