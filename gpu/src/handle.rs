//! Typed, non-owning GPU object handles.
//!
//! Backends hand out handles; owning wrappers such as [`Buffer`](crate::Buffer)
//! keep one and release it exactly once. Handles are plain `Copy` values used in
//! binding and copy descriptors. They carry a generation counter so a stale
//! handle (one whose object was released and whose slot was reused) is detected
//! instead of silently aliasing the new object.

/// Untyped handle: slot index plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    /// Create a raw handle from its parts.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(RawHandle);

        impl $name {
            /// Wrap a raw handle issued by a backend.
            pub const fn from_raw(raw: RawHandle) -> Self {
                Self(raw)
            }

            /// The untyped handle.
            pub fn raw(&self) -> RawHandle {
                self.0
            }
        }
    };
}

typed_handle!(
    /// Handle to a device-resident buffer.
    BufferHandle
);
typed_handle!(
    /// Handle to a host-visible transfer buffer.
    TransferBufferHandle
);
typed_handle!(
    /// Handle to a texture, including swapchain textures.
    TextureHandle
);
typed_handle!(
    /// Handle to a sampler.
    SamplerHandle
);
typed_handle!(
    /// Handle to a shader module.
    ShaderHandle
);
typed_handle!(
    /// Handle to a graphics pipeline.
    GraphicsPipelineHandle
);
typed_handle!(
    /// Handle to a compute pipeline.
    ComputePipelineHandle
);
typed_handle!(
    /// Handle to a submission fence.
    FenceHandle
);
typed_handle!(
    /// Handle to a command buffer being recorded.
    CommandBufferHandle
);

/// Generational slot table.
///
/// Removing an entry bumps the slot generation, so every handle issued for the
/// old entry stops resolving. Removing an unknown or stale handle is a no-op.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> HandleTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value and return its handle.
    pub fn insert(&mut self, value: T) -> RawHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return RawHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        RawHandle::new(index, 0)
    }

    /// Look up a live entry.
    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Look up a live entry mutably.
    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether the handle refers to a live entry.
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove an entry. Returns `None` for unknown or already-removed handles.
    pub fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }

    /// Iterate live entries.
    pub fn iter(&self) -> impl Iterator<Item = (RawHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (RawHandle::new(index as u32, slot.generation), value))
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut table = HandleTable::new();
        let a = table.insert(1u32);
        assert_eq!(table.remove(a), Some(1));
        assert_eq!(table.remove(a), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_alias_reused_slot() {
        let mut table = HandleTable::new();
        let old = table.insert(1u32);
        table.remove(old);
        let new = table.insert(2u32);

        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(table.get(old), None);
        assert_eq!(table.remove(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut table = HandleTable::new();
        let a = table.insert(1u32);
        let b = table.insert(2u32);
        table.clear();
        assert!(!table.contains(a));
        assert!(!table.contains(b));
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_typed_handle_round_trip() {
        let raw = RawHandle::new(3, 7);
        let handle = BufferHandle::from_raw(raw);
        assert_eq!(handle.raw(), raw);
    }
}
