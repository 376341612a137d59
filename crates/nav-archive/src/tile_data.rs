//! Ownership-tagged tile payload buffers
//!
//! A tile payload crosses a processing boundary twice: once when a builder
//! produces it, and once when a tile set takes it over. The ownership tag
//! records which side is responsible for releasing the bytes at any
//! instant, so a payload is released exactly once.

use nav_common::{Error, Result};

/// Who is responsible for releasing a tile payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataOwnership {
    /// Not owned by this library; also the state of an empty buffer
    #[default]
    External,
    /// Allocated locally and releasable through [`TileData::release`]
    Local,
    /// Handed off to a tile set; only the set's teardown releases it
    Container,
}

/// A tile payload together with its ownership tag
///
/// The buffer is write-once: any "build into" operation rejects a target
/// that already holds a payload. After a successful hand-off to a tile set
/// the tag reads [`DataOwnership::Container`] and the payload is no longer
/// reachable through this value, so the original holder can neither free
/// nor mutate it.
#[derive(Debug, Default)]
pub struct TileData {
    data: Vec<u8>,
    ownership: DataOwnership,
}

impl TileData {
    /// Creates an empty buffer ready to be built into
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a locally copied payload
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            ownership: DataOwnership::Local,
        }
    }

    /// Wraps a payload produced outside this library
    ///
    /// The tag blocks [`release`](TileData::release); the bytes are still
    /// dropped with the value itself, nothing leaks.
    pub fn from_external(data: Vec<u8>) -> Self {
        Self {
            data,
            ownership: DataOwnership::External,
        }
    }

    /// The payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no payload
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The current ownership tag
    pub fn ownership(&self) -> DataOwnership {
        self.ownership
    }

    /// Stores a locally allocated payload into an empty buffer
    pub(crate) fn assign_local(&mut self, data: Vec<u8>) -> Result<()> {
        if !self.data.is_empty() {
            return Err(Error::InvalidParam(
                "target buffer already holds a payload".to_string(),
            ));
        }
        self.data = data;
        self.ownership = DataOwnership::Local;
        Ok(())
    }

    /// Completes a hand-off to a tile set
    ///
    /// Moves the payload out and marks this value container-owned. Must be
    /// the last operation the original owner performs on the payload.
    pub(crate) fn take_for_container(&mut self) -> Vec<u8> {
        self.ownership = DataOwnership::Container;
        std::mem::take(&mut self.data)
    }

    /// Releases a locally owned payload
    ///
    /// Returns `true` if the payload was released. A no-op returning
    /// `false` for empty, external, or container-owned buffers; releasing
    /// after a hand-off can never double-free.
    pub fn release(&mut self) -> bool {
        if self.data.is_empty() || self.ownership != DataOwnership::Local {
            return false;
        }
        self.data = Vec::new();
        self.ownership = DataOwnership::External;
        true
    }
}
