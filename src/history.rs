//! Per-integration-point history variables.
//!
//! Each integration point owns a model-declared number of history slots, held twice: the
//! *current* values, which kernels may read and mutate during a nonlinear iteration, and the
//! *old* values, which are only ever written by committing a converged step.
//!
//! The lifecycle of a point is
//!
//! ```text
//! Uninitialized --init--> Current --(evaluate)*--> Current --commit--> Committed --evaluate--> Current ...
//! ```
//!
//! Initialization may be repeated from any state and resets the current values. Committing is
//! idempotent. Any other use of an uninitialized point is a fatal error.
use crate::error::{ensure_exact_len, KernelError};
use crate::Real;
use log::{debug, info};
use nalgebra::Scalar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryState {
    Uninitialized,
    Current,
    Committed,
}

/// History storage for a set of integration points.
///
/// Slots of all points live in two contiguous arrays. Points can be handed out one at a time
/// ([`HistoryStore::point_mut`]) or all at once for parallel evaluation
/// ([`HistoryStore::par_points_mut`]), in which case every worker has exclusive access to the
/// slots of the points it receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HistoryStoreData<T>")]
#[serde(bound(deserialize = "T: Real + Deserialize<'de>"))]
pub struct HistoryStore<T: Scalar> {
    slots: usize,
    // Points are laid out with a stride of max(slots, 1) so that chunking works for
    // slot-free models too.
    current: Vec<T>,
    old: Vec<T>,
    states: Vec<HistoryState>,
}

impl<T: Real> HistoryStore<T> {
    /// Allocates zeroed storage for `num_points` points with `slots` values each.
    pub fn new(num_points: usize, slots: usize) -> Self {
        let stride = slots.max(1);
        debug!("Allocating history for {} points with {} slots each", num_points, slots);
        Self {
            slots,
            current: vec![T::zero(); num_points * stride],
            old: vec![T::zero(); num_points * stride],
            states: vec![HistoryState::Uninitialized; num_points],
        }
    }

    fn stride(&self) -> usize {
        self.slots.max(1)
    }

    pub fn num_points(&self) -> usize {
        self.states.len()
    }

    pub fn slots_per_point(&self) -> usize {
        self.slots
    }

    /// Slot range of the given point, or a [`KernelError::SizeMismatch`] if it is out of range.
    fn slot_range(&self, point: usize) -> eyre::Result<Range<usize>> {
        if point >= self.num_points() {
            return Err(KernelError::SizeMismatch {
                what: "history points",
                expected: point + 1,
                actual: self.num_points(),
            }
            .fatal());
        }
        let begin = point * self.stride();
        Ok(begin..begin + self.slots)
    }

    pub fn state(&self, point: usize) -> eyre::Result<HistoryState> {
        self.slot_range(point)?;
        Ok(self.states[point])
    }

    /// Current values of the given point.
    pub fn current(&self, point: usize) -> eyre::Result<&[T]> {
        let range = self.slot_range(point)?;
        Ok(&self.current[range])
    }

    /// Values committed by the last converged step.
    pub fn old(&self, point: usize) -> eyre::Result<&[T]> {
        let range = self.slot_range(point)?;
        Ok(&self.old[range])
    }

    pub fn point_mut(&mut self, point: usize) -> eyre::Result<HistoryPoint<'_, T>> {
        let range = self.slot_range(point)?;
        Ok(HistoryPoint {
            index: point,
            current: &mut self.current[range.clone()],
            old: &mut self.old[range],
            state: &mut self.states[point],
        })
    }

    pub fn points_mut(&mut self) -> impl ExactSizeIterator<Item = HistoryPoint<'_, T>> {
        let slots = self.slots;
        let stride = self.stride();
        self.current
            .chunks_mut(stride)
            .zip(self.old.chunks_mut(stride))
            .zip(self.states.iter_mut())
            .enumerate()
            .map(move |(index, ((current, old), state))| HistoryPoint {
                index,
                current: &mut current[..slots],
                old: &mut old[..slots],
                state,
            })
    }

    pub fn par_points_mut(&mut self) -> impl IndexedParallelIterator<Item = HistoryPoint<'_, T>> {
        let slots = self.slots;
        let stride = self.stride();
        self.current
            .par_chunks_mut(stride)
            .zip(self.old.par_chunks_mut(stride))
            .zip(self.states.par_iter_mut())
            .enumerate()
            .map(move |(index, ((current, old), state))| HistoryPoint {
                index,
                current: &mut current[..slots],
                old: &mut old[..slots],
                state,
            })
    }

    /// Commits every point of a converged step.
    pub fn commit_all(&mut self) -> eyre::Result<()> {
        self.par_points_mut()
            .try_for_each(|mut point| point.commit())?;
        info!("Committed history of {} integration points", self.num_points());
        Ok(())
    }
}

/// Serialized form of [`HistoryStore`], checked for consistent lengths before use.
#[derive(Deserialize)]
struct HistoryStoreData<T> {
    slots: usize,
    current: Vec<T>,
    old: Vec<T>,
    states: Vec<HistoryState>,
}

impl<T: Real> TryFrom<HistoryStoreData<T>> for HistoryStore<T> {
    type Error = KernelError;

    fn try_from(data: HistoryStoreData<T>) -> Result<Self, KernelError> {
        let expected = data.states.len() * data.slots.max(1);
        for (what, actual) in [("history current values", data.current.len()), ("history old values", data.old.len())] {
            if actual != expected {
                return Err(KernelError::SizeMismatch { what, expected, actual });
            }
        }
        Ok(Self {
            slots: data.slots,
            current: data.current,
            old: data.old,
            states: data.states,
        })
    }
}

/// Exclusive access to the history slots of a single integration point.
#[derive(Debug)]
pub struct HistoryPoint<'a, T> {
    index: usize,
    current: &'a mut [T],
    old: &'a mut [T],
    state: &'a mut HistoryState,
}

impl<'a, T: Real> HistoryPoint<'a, T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> HistoryState {
        *self.state
    }

    pub fn slots(&self) -> usize {
        self.current.len()
    }

    pub fn current(&self) -> &[T] {
        &*self.current
    }

    /// Mutable current values. Taking them moves a committed point back to `Current`.
    pub fn current_mut(&mut self) -> &mut [T] {
        if *self.state == HistoryState::Committed {
            *self.state = HistoryState::Current;
        }
        &mut *self.current
    }

    pub fn ensure_initialized(&self) -> eyre::Result<()> {
        match *self.state {
            HistoryState::Uninitialized => Err(KernelError::HistoryNotInitialized { point: self.index }.fatal()),
            _ => Ok(()),
        }
    }

    pub fn ensure_slots(&self, slots: usize) -> eyre::Result<()> {
        ensure_exact_len("history slots", slots, self.current.len())
    }

    /// Runs `init` on the current values and marks the point as initialized.
    ///
    /// The values are zeroed before `init` runs, so repeating the transition yields the same
    /// state as running it once.
    pub fn initialize_with(&mut self, init: impl FnOnce(&mut [T]) -> eyre::Result<()>) -> eyre::Result<()> {
        self.current.fill(T::zero());
        init(&mut *self.current)?;
        *self.state = HistoryState::Current;
        Ok(())
    }

    /// Copies the current values into the old values.
    pub fn commit(&mut self) -> eyre::Result<()> {
        self.ensure_initialized()?;
        self.old.copy_from_slice(&*self.current);
        *self.state = HistoryState::Committed;
        Ok(())
    }
}
