//! Tile-set archive format
//!
//! An archive is a top header (format version, tile count, tiling
//! parameters) followed by one record per live tile. Each record carries
//! the tile's reference, the payload size, and the payload bytes, so a
//! rebuilt set hands out the same references the packed set did.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use nav_common::{Error, Result};

use super::tile_data::TileData;
use super::tile_set::{NavMeshParams, TileRef, TileSet};

/// Current archive format version
pub const NAVMESH_SET_VERSION: i32 = 1;

/// Serialized archive header size in bytes
pub const SET_HEADER_SIZE: usize = 36;

/// Serialized per-tile record header size in bytes
pub const TILE_RECORD_HEADER_SIZE: usize = 12;

struct NavMeshSetHeader {
    version: i32,
    tile_count: i32,
    params: NavMeshParams,
}

impl NavMeshSetHeader {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_i32::<LittleEndian>(self.version)?;
        out.write_i32::<LittleEndian>(self.tile_count)?;
        for &v in &self.params.origin {
            out.write_f32::<LittleEndian>(v)?;
        }
        out.write_f32::<LittleEndian>(self.params.tile_width)?;
        out.write_f32::<LittleEndian>(self.params.tile_height)?;
        out.write_i32::<LittleEndian>(self.params.max_tiles)?;
        out.write_i32::<LittleEndian>(self.params.max_polys_per_tile)?;
        Ok(())
    }

    fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let version = cursor.read_i32::<LittleEndian>()?;
        let tile_count = cursor.read_i32::<LittleEndian>()?;
        let mut origin = [0.0; 3];
        cursor.read_f32_into::<LittleEndian>(&mut origin)?;
        let tile_width = cursor.read_f32::<LittleEndian>()?;
        let tile_height = cursor.read_f32::<LittleEndian>()?;
        let max_tiles = cursor.read_i32::<LittleEndian>()?;
        let max_polys_per_tile = cursor.read_i32::<LittleEndian>()?;

        Ok(Self {
            version,
            tile_count,
            params: NavMeshParams {
                origin,
                tile_width,
                tile_height,
                max_tiles,
                max_polys_per_tile,
            },
        })
    }
}

/// Packs a tile set into a single archive buffer
///
/// Only live tiles are written. The output size is computed up front and
/// reserved in one allocation.
pub fn pack_tile_set(set: &TileSet) -> Result<Vec<u8>> {
    let payload_total: usize = set.tiles().map(|t| t.payload().len()).sum();
    let total = SET_HEADER_SIZE
        + set.tile_count() * TILE_RECORD_HEADER_SIZE
        + payload_total;

    let mut out = Vec::new();
    out.try_reserve_exact(total)?;

    let header = NavMeshSetHeader {
        version: NAVMESH_SET_VERSION,
        tile_count: set.tile_count() as i32,
        params: set.params().clone(),
    };
    header.write_to(&mut out)?;

    for tile in set.tiles() {
        out.write_u64::<LittleEndian>(tile.tile_ref().id())?;
        out.write_i32::<LittleEndian>(tile.payload().len() as i32)?;
        out.extend_from_slice(tile.payload());
    }

    Ok(out)
}

/// Unpacks an archive buffer into a freshly built tile set
///
/// All-or-nothing: any malformed header, truncated record, or rejected
/// tile fails the whole unpack and no partial set is returned. Tiles are
/// restored under the references they were packed with.
pub fn unpack_tile_set(data: &[u8]) -> Result<TileSet> {
    if data.len() < SET_HEADER_SIZE {
        return Err(Error::InvalidParam(
            "buffer is smaller than an archive header".to_string(),
        ));
    }

    let mut cursor = Cursor::new(data);
    let header = NavMeshSetHeader::read_from(&mut cursor)?;

    if header.version != NAVMESH_SET_VERSION {
        return Err(Error::WrongVersion {
            expected: NAVMESH_SET_VERSION,
            found: header.version,
        });
    }
    if header.tile_count < 0 {
        return Err(Error::CorruptRecord(
            "negative tile count".to_string(),
        ));
    }

    let mut set = TileSet::new(header.params)?;

    for i in 0..header.tile_count {
        let pos = cursor.position() as usize;
        if data.len() - pos < TILE_RECORD_HEADER_SIZE {
            return Err(Error::CorruptRecord(format!(
                "truncated before tile record {}",
                i
            )));
        }

        let tile_ref = TileRef::new(cursor.read_u64::<LittleEndian>()?);
        let data_size = cursor.read_i32::<LittleEndian>()?;
        if tile_ref.is_null() || data_size <= 0 {
            return Err(Error::CorruptRecord(format!(
                "tile record {} has a null reference or empty payload",
                i
            )));
        }

        let pos = cursor.position() as usize;
        let data_size = data_size as usize;
        if data.len() - pos < data_size {
            return Err(Error::CorruptRecord(format!(
                "tile record {} payload is truncated",
                i
            )));
        }

        let mut tile = TileData::from_bytes(&data[pos..pos + data_size]);
        cursor.set_position((pos + data_size) as u64);

        set.insert(&mut tile, tile_ref)?;
    }

    Ok(set)
}
