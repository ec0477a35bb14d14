//! Fixed-capacity binding slot tables.

use crate::error::GpuError;

/// A zero-based table of binding slots.
///
/// Binding `K` values at slot `N` replaces exactly slots `[N, N + K)` and leaves
/// every other slot untouched. A bind that would run past the capacity is
/// rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlots<T> {
    slots: Vec<Option<T>>,
}

impl<T: Copy> BindingSlots<T> {
    /// Create a table with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Bind `values` starting at `first_slot`.
    pub fn bind(&mut self, first_slot: u32, values: &[T]) -> Result<(), GpuError> {
        let first = first_slot as usize;
        let end = first.checked_add(values.len()).filter(|&end| end <= self.slots.len());
        let Some(end) = end else {
            return Err(GpuError::InvalidParameter(format!(
                "binding {} values at slot {first_slot} exceeds {} slots",
                values.len(),
                self.slots.len()
            )));
        };
        for (slot, value) in self.slots[first..end].iter_mut().zip(values) {
            *slot = Some(*value);
        }
        Ok(())
    }

    /// Value bound at `slot`.
    pub fn get(&self, slot: u32) -> Option<T> {
        self.slots.get(slot as usize).copied().flatten()
    }

    /// Whether every slot in `[0, count)` is bound.
    pub fn is_bound_prefix(&self, count: u32) -> bool {
        (count as usize) <= self.slots.len()
            && self.slots[..count as usize].iter().all(Option::is_some)
    }

    /// Values bound in `[0, count)`, stopping at the first gap.
    pub fn prefix(&self, count: u32) -> impl Iterator<Item = T> + '_ {
        self.slots
            .iter()
            .take(count as usize)
            .map_while(|slot| *slot)
    }

    /// Unbind every slot.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}
