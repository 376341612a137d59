//! Slot-based tile container
//!
//! The tile set stores opaque tile payloads in fixed slots and addresses
//! them through salted references, so a reference to a removed tile can
//! never resolve to a later occupant of the same slot. Inserting a payload
//! completes the ownership hand-off started by the caller's [`TileData`].

use nav_common::{Error, Result};

use super::tile_data::{DataOwnership, TileData};
use super::tile_header::read_tile_data_header;

/// Opaque reference to a tile inside a [`TileSet`]
///
/// The null reference is all zeroes; a valid reference encodes the slot
/// index and the slot's salt at the time of insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileRef(u64);

impl TileRef {
    /// The null tile reference
    pub const NULL: TileRef = TileRef(0);

    /// Creates a reference from its raw id
    pub fn new(id: u64) -> Self {
        TileRef(id)
    }

    /// The raw id of this reference
    pub fn id(self) -> u64 {
        self.0
    }

    /// Whether this is the null reference
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn encode(salt: u32, index: usize) -> Self {
        TileRef(((salt as u64) << 32) | (index as u64 + 1))
    }

    pub(crate) fn decode(self) -> Option<(u32, usize)> {
        let low = self.0 & 0xffff_ffff;
        if low == 0 {
            return None;
        }
        Some(((self.0 >> 32) as u32, (low - 1) as usize))
    }
}

/// Parameters describing the tiling of a navigation mesh
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavMeshParams {
    /// World-space origin of the tile grid
    pub origin: [f32; 3],
    /// Width of each tile along the x axis
    pub tile_width: f32,
    /// Height of each tile along the z axis
    pub tile_height: f32,
    /// Maximum number of tiles the set can hold
    pub max_tiles: i32,
    /// Maximum number of polygons a single tile may carry
    pub max_polys_per_tile: i32,
}

/// A tile held by a [`TileSet`]
#[derive(Debug)]
pub struct StoredTile {
    tile_ref: TileRef,
    data: Vec<u8>,
}

impl StoredTile {
    /// The reference addressing this tile
    pub fn tile_ref(&self) -> TileRef {
        self.tile_ref
    }

    /// The tile's payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data
    }
}

/// A collection of tiles addressed by salted references
#[derive(Debug)]
pub struct TileSet {
    params: NavMeshParams,
    tiles: Vec<Option<StoredTile>>,
    next_salt: u32,
}

impl TileSet {
    /// Creates an empty tile set from validated parameters
    pub fn new(params: NavMeshParams) -> Result<Self> {
        if params.origin.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParam(
                "tile grid origin must be finite".to_string(),
            ));
        }
        if params.tile_width <= 0.0 || params.tile_height <= 0.0 {
            return Err(Error::InvalidParam(
                "tile dimensions must be positive".to_string(),
            ));
        }
        if params.max_tiles <= 0 || params.max_polys_per_tile <= 0 {
            return Err(Error::InvalidParam(
                "tile and polygon limits must be positive".to_string(),
            ));
        }

        let mut tiles = Vec::with_capacity(params.max_tiles as usize);
        tiles.resize_with(params.max_tiles as usize, || None);

        Ok(Self {
            params,
            tiles,
            next_salt: 1,
        })
    }

    /// The parameters the set was created with
    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// Number of tile slots
    pub fn max_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Number of live tiles
    pub fn tile_count(&self) -> usize {
        self.tiles.iter().flatten().count()
    }

    /// Iterates over the live tiles in slot order
    pub fn tiles(&self) -> impl Iterator<Item = &StoredTile> {
        self.tiles.iter().flatten()
    }

    /// Looks up a tile by reference, checking the slot's salt
    pub fn tile_by_ref(&self, tile_ref: TileRef) -> Option<&StoredTile> {
        let (_, index) = tile_ref.decode()?;
        let stored = self.tiles.get(index)?.as_ref()?;
        if stored.tile_ref != tile_ref {
            return None;
        }
        Some(stored)
    }

    /// Inserts a tile payload, taking ownership of it on success
    ///
    /// The payload's own header is validated (magic, version, polygon
    /// budget) before anything changes hands. A non-null `last_ref`
    /// restores the tile into the slot and salt it previously occupied,
    /// which keeps references stable across an archive round trip. On
    /// success the caller's buffer is left empty and container-tagged; on
    /// failure it is untouched.
    pub fn insert(&mut self, data: &mut TileData, last_ref: TileRef) -> Result<TileRef> {
        if data.is_empty() {
            return Err(Error::InvalidParam(
                "tile payload is empty".to_string(),
            ));
        }
        if data.ownership() == DataOwnership::Container {
            return Err(Error::InvalidParam(
                "tile payload is already owned by a container".to_string(),
            ));
        }

        let header = read_tile_data_header(data.data())?;
        if header.poly_count < 1 {
            return Err(Error::InvalidParam(
                "tile payload declares no polygons".to_string(),
            ));
        }
        if header.poly_count > self.params.max_polys_per_tile {
            return Err(Error::InvalidParam(format!(
                "tile payload declares {} polygons, set allows {}",
                header.poly_count, self.params.max_polys_per_tile
            )));
        }

        let (salt, index) = if last_ref.is_null() {
            let index = self
                .tiles
                .iter()
                .position(|slot| slot.is_none())
                .ok_or(Error::OutOfMemory)?;
            let salt = self.next_salt;
            self.next_salt = self.next_salt.checked_add(1).unwrap_or(1);
            (salt, index)
        } else {
            let (salt, index) = last_ref.decode().ok_or_else(|| {
                Error::InvalidParam("malformed tile reference".to_string())
            })?;
            if index >= self.tiles.len() {
                return Err(Error::InvalidParam(format!(
                    "tile reference addresses slot {} of {}",
                    index,
                    self.tiles.len()
                )));
            }
            if self.tiles[index].is_some() {
                return Err(Error::InvalidParam(format!(
                    "tile slot {} is already occupied",
                    index
                )));
            }
            (salt, index)
        };

        let tile_ref = TileRef::encode(salt, index);
        self.tiles[index] = Some(StoredTile {
            tile_ref,
            data: data.take_for_container(),
        });

        Ok(tile_ref)
    }

    /// Removes a tile, yielding its payload back as a locally owned buffer
    pub fn remove(&mut self, tile_ref: TileRef) -> Result<TileData> {
        let (_, index) = tile_ref.decode().ok_or_else(|| {
            Error::InvalidParam("malformed tile reference".to_string())
        })?;

        let slot = self.tiles.get_mut(index).ok_or_else(|| {
            Error::InvalidParam(format!("tile reference addresses slot {} out of range", index))
        })?;

        match slot.take() {
            Some(stored) if stored.tile_ref == tile_ref => {
                let mut data = TileData::new();
                data.assign_local(stored.data)?;
                Ok(data)
            }
            other => {
                *slot = other;
                Err(Error::InvalidParam(
                    "tile reference does not match a live tile".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_header::{TileDataHeader, TILE_DATA_MAGIC, TILE_DATA_VERSION};

    fn params() -> NavMeshParams {
        NavMeshParams {
            origin: [0.0, 0.0, 0.0],
            tile_width: 32.0,
            tile_height: 32.0,
            max_tiles: 4,
            max_polys_per_tile: 128,
        }
    }

    fn payload(x: i32, y: i32, poly_count: i32) -> Vec<u8> {
        let header = TileDataHeader {
            magic: TILE_DATA_MAGIC,
            version: TILE_DATA_VERSION,
            x,
            y,
            layer: 0,
            user_id: 0,
            poly_count,
            vert_count: poly_count * 3,
            detail_mesh_count: poly_count,
            detail_vert_count: 0,
            detail_tri_count: 0,
            bmin: [x as f32 * 32.0, 0.0, y as f32 * 32.0],
            bmax: [(x + 1) as f32 * 32.0, 4.0, (y + 1) as f32 * 32.0],
            walkable_height: 2.0,
            walkable_radius: 0.6,
            walkable_climb: 0.9,
        };
        let mut data = Vec::new();
        header.write_to(&mut data).unwrap();
        data.extend_from_slice(&vec![(x + y) as u8; 24]);
        data
    }

    #[test]
    fn test_insert_transfers_ownership() {
        let mut set = TileSet::new(params()).unwrap();
        let bytes = payload(0, 0, 4);
        let mut data = TileData::from_bytes(&bytes);

        let tile_ref = set.insert(&mut data, TileRef::NULL).unwrap();
        assert!(!tile_ref.is_null());
        assert!(data.is_empty());
        assert_eq!(data.ownership(), DataOwnership::Container);
        assert!(!data.release());

        assert_eq!(set.tile_count(), 1);
        assert_eq!(set.tile_by_ref(tile_ref).unwrap().payload(), &bytes[..]);
    }

    #[test]
    fn test_insert_rejects_bad_payload() {
        let mut set = TileSet::new(params()).unwrap();

        let mut empty = TileData::new();
        assert!(set.insert(&mut empty, TileRef::NULL).is_err());

        let mut garbage = TileData::from_bytes(&[0u8; 128]);
        assert!(matches!(
            set.insert(&mut garbage, TileRef::NULL),
            Err(Error::WrongMagic)
        ));
        // Failed insert leaves the caller's buffer untouched.
        assert_eq!(garbage.len(), 128);
        assert_eq!(garbage.ownership(), DataOwnership::Local);

        let mut over_budget = TileData::from_bytes(&payload(0, 0, 1000));
        assert!(set.insert(&mut over_budget, TileRef::NULL).is_err());
    }

    #[test]
    fn test_insert_when_full() {
        let small = NavMeshParams {
            max_tiles: 1,
            ..params()
        };
        let mut set = TileSet::new(small).unwrap();

        let mut first = TileData::from_bytes(&payload(0, 0, 4));
        set.insert(&mut first, TileRef::NULL).unwrap();

        let mut second = TileData::from_bytes(&payload(1, 0, 4));
        assert!(matches!(
            set.insert(&mut second, TileRef::NULL),
            Err(Error::OutOfMemory)
        ));
    }

    #[test]
    fn test_remove_yields_payload() {
        let mut set = TileSet::new(params()).unwrap();
        let bytes = payload(0, 0, 4);
        let mut data = TileData::from_bytes(&bytes);
        let tile_ref = set.insert(&mut data, TileRef::NULL).unwrap();

        let mut returned = set.remove(tile_ref).unwrap();
        assert_eq!(returned.data(), &bytes[..]);
        assert_eq!(returned.ownership(), DataOwnership::Local);
        assert!(returned.release());

        assert_eq!(set.tile_count(), 0);
        assert!(set.tile_by_ref(tile_ref).is_none());
        assert!(set.remove(tile_ref).is_err());
    }

    #[test]
    fn test_stale_ref_does_not_resolve_to_new_occupant() {
        let mut set = TileSet::new(params()).unwrap();
        let mut first = TileData::from_bytes(&payload(0, 0, 4));
        let old_ref = set.insert(&mut first, TileRef::NULL).unwrap();
        set.remove(old_ref).unwrap();

        let mut second = TileData::from_bytes(&payload(1, 1, 4));
        let new_ref = set.insert(&mut second, TileRef::NULL).unwrap();

        assert_ne!(old_ref, new_ref);
        assert!(set.tile_by_ref(old_ref).is_none());
        assert!(set.tile_by_ref(new_ref).is_some());
    }

    #[test]
    fn test_insert_with_last_ref_restores_slot() {
        let mut set = TileSet::new(params()).unwrap();
        let mut first = TileData::from_bytes(&payload(0, 0, 4));
        let tile_ref = set.insert(&mut first, TileRef::NULL).unwrap();

        let removed = set.remove(tile_ref).unwrap();
        let mut again = TileData::from_bytes(removed.data());
        let restored = set.insert(&mut again, tile_ref).unwrap();

        assert_eq!(restored, tile_ref);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut bad = params();
        bad.tile_width = 0.0;
        assert!(TileSet::new(bad).is_err());

        let mut bad = params();
        bad.max_tiles = 0;
        assert!(TileSet::new(bad).is_err());

        let mut bad = params();
        bad.origin[1] = f32::NAN;
        assert!(TileSet::new(bad).is_err());
    }
}
