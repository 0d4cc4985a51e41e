use std::collections::BTreeMap;

use crate::backend::BackendError;
use crate::types::{UniformLocation, UniformValue};

/// Byte range a uniform occupies inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniformSlot {
    pub offset: u32,
    pub size: u32,
}

/// Member table of the single `std140` uniform block a program may declare.
///
/// Locations handed to the host are the members' byte offsets, so a location
/// is enough to find where an upload lands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UniformLayout {
    members: BTreeMap<String, UniformSlot>,
    span: u32,
}

impl UniformLayout {
    pub fn with_span(span: u32) -> Self {
        Self {
            members: BTreeMap::new(),
            span,
        }
    }

    pub fn insert(&mut self, name: String, slot: UniformSlot) -> Result<(), String> {
        match self.members.get(&name) {
            Some(existing) if *existing != slot => Err(format!(
                "error: uniform `{name}` is laid out differently across stages (offset {} vs {})",
                existing.offset, slot.offset
            )),
            _ => {
                self.span = self.span.max(slot.offset + slot.size);
                self.members.insert(name, slot);
                Ok(())
            }
        }
    }

    /// Folds the other stage's view of the block into this one.
    pub fn merge(&mut self, other: &UniformLayout) -> Result<(), String> {
        for (name, slot) in &other.members {
            self.insert(name.clone(), *slot)?;
        }
        self.span = self.span.max(other.span);
        Ok(())
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.members
            .get(name)
            .map(|slot| UniformLocation(slot.offset))
    }

    pub fn slot_at(&self, location: UniformLocation) -> Option<UniformSlot> {
        self.members
            .values()
            .copied()
            .find(|slot| slot.offset == location.0)
    }

    /// Buffer size rounded up to the 16-byte `std140` block alignment.
    pub fn buffer_size(&self) -> u64 {
        let span = u64::from(self.span.max(16));
        span.div_ceil(16) * 16
    }
}

/// CPU mirror of a program's uniform buffer.
#[derive(Debug, Clone)]
pub(crate) struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0; layout.buffer_size() as usize];
        Self {
            layout,
            bytes,
            dirty: true,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Stores `value` at `location`; the value must fill the member exactly.
    pub fn write(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Result<(), BackendError> {
        let slot = self
            .layout
            .slot_at(location)
            .ok_or(BackendError::InvalidOperation)?;
        if slot.size as usize != value.byte_len() {
            return Err(BackendError::InvalidOperation);
        }
        let start = slot.offset as usize;
        let end = start + value.byte_len();
        let target = self
            .bytes
            .get_mut(start..end)
            .ok_or(BackendError::InvalidOperation)?;
        value.write_to(target);
        self.dirty = true;
        Ok(())
    }

    /// Returns the block contents if they changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if std::mem::take(&mut self.dirty) {
            Some(&self.bytes)
        } else {
            None
        }
    }
}
