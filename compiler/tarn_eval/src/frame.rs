//! Shared global frame.
//!
//! One frame per interpreter holds the values of every package-level
//! variable, constant and function of every loaded package. Slots are
//! reserved ahead of time by the loader and the frame is grown to cover
//! them before any code referencing them runs. The frame never shrinks.

use parking_lot::RwLock;
use tarn_ir::Slot;

use crate::Value;

#[derive(Default)]
pub struct Frame {
    slots: RwLock<Vec<Option<Value>>>,
}

impl Frame {
    pub fn new() -> Self {
        Frame {
            slots: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Grow to at least `len` slots. Smaller lengths are ignored.
    pub fn grow(&self, len: usize) {
        let mut slots = self.slots.write();
        if slots.len() < len {
            slots.resize(len, None);
        }
    }

    /// Grow to `len` and store `values`, under one write lock.
    pub fn install(&self, len: usize, values: impl IntoIterator<Item = (Slot, Value)>) {
        let mut slots = self.slots.write();
        if slots.len() < len {
            slots.resize(len, None);
        }
        for (slot, value) in values {
            if slot.index() >= slots.len() {
                slots.resize(slot.index() + 1, None);
            }
            slots[slot.index()] = Some(value);
        }
    }

    /// Value in `slot`; `None` when unset or out of range.
    #[inline]
    pub fn load(&self, slot: Slot) -> Option<Value> {
        self.slots.read().get(slot.index()).cloned().flatten()
    }

    /// Store into an existing slot. Returns false if the slot is out of
    /// range, which means the frame was not grown for it.
    #[inline]
    pub fn store(&self, slot: Slot, value: Value) -> bool {
        match self.slots.write().get_mut(slot.index()) {
            Some(entry) => {
                *entry = Some(value);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({} slots)", self.len())
    }
}
