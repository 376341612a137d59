//! Tile payload header and header-only inspection
//!
//! Every tile payload starts with a fixed-layout header carrying a magic
//! constant and a format version. Inspection reads just that header, so a
//! malformed or foreign buffer is rejected cheaply without touching the
//! payload data behind it.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use nav_common::{Error, Result};

/// Magic number identifying a tile payload ('NAVT' in little-endian)
pub const TILE_DATA_MAGIC: u32 = 0x5456_414E;

/// Current tile payload format version
pub const TILE_DATA_VERSION: i32 = 7;

/// Serialized tile payload header size in bytes
pub const TILE_DATA_HEADER_SIZE: usize = 80;

/// Fixed-layout header at the start of every tile payload
#[derive(Debug, Clone, PartialEq)]
pub struct TileDataHeader {
    /// Must equal [`TILE_DATA_MAGIC`]
    pub magic: u32,
    /// Must equal [`TILE_DATA_VERSION`]
    pub version: i32,
    /// Tile grid x coordinate
    pub x: i32,
    /// Tile grid y coordinate
    pub y: i32,
    /// Layer within the tile column
    pub layer: i32,
    /// User assigned tile id
    pub user_id: u32,
    /// Number of polygons in the tile
    pub poly_count: i32,
    /// Number of vertices in the tile
    pub vert_count: i32,
    /// Number of detail submeshes
    pub detail_mesh_count: i32,
    /// Number of detail vertices
    pub detail_vert_count: i32,
    /// Number of detail triangles
    pub detail_tri_count: i32,
    /// Minimum bounds of the tile
    pub bmin: [f32; 3],
    /// Maximum bounds of the tile
    pub bmax: [f32; 3],
    /// Minimum height where the agent can still walk
    pub walkable_height: f32,
    /// Radius of the agent
    pub walkable_radius: f32,
    /// Maximum ledge height the agent can climb
    pub walkable_climb: f32,
}

impl TileDataHeader {
    /// Writes the header in its serialized layout
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u32::<LittleEndian>(self.magic)?;
        out.write_i32::<LittleEndian>(self.version)?;
        out.write_i32::<LittleEndian>(self.x)?;
        out.write_i32::<LittleEndian>(self.y)?;
        out.write_i32::<LittleEndian>(self.layer)?;
        out.write_u32::<LittleEndian>(self.user_id)?;
        out.write_i32::<LittleEndian>(self.poly_count)?;
        out.write_i32::<LittleEndian>(self.vert_count)?;
        out.write_i32::<LittleEndian>(self.detail_mesh_count)?;
        out.write_i32::<LittleEndian>(self.detail_vert_count)?;
        out.write_i32::<LittleEndian>(self.detail_tri_count)?;
        for &v in &self.bmin {
            out.write_f32::<LittleEndian>(v)?;
        }
        for &v in &self.bmax {
            out.write_f32::<LittleEndian>(v)?;
        }
        out.write_f32::<LittleEndian>(self.walkable_height)?;
        out.write_f32::<LittleEndian>(self.walkable_radius)?;
        out.write_f32::<LittleEndian>(self.walkable_climb)?;
        Ok(())
    }

    fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let magic = cursor.read_u32::<LittleEndian>()?;
        let version = cursor.read_i32::<LittleEndian>()?;
        let x = cursor.read_i32::<LittleEndian>()?;
        let y = cursor.read_i32::<LittleEndian>()?;
        let layer = cursor.read_i32::<LittleEndian>()?;
        let user_id = cursor.read_u32::<LittleEndian>()?;
        let poly_count = cursor.read_i32::<LittleEndian>()?;
        let vert_count = cursor.read_i32::<LittleEndian>()?;
        let detail_mesh_count = cursor.read_i32::<LittleEndian>()?;
        let detail_vert_count = cursor.read_i32::<LittleEndian>()?;
        let detail_tri_count = cursor.read_i32::<LittleEndian>()?;
        let mut bmin = [0.0; 3];
        cursor.read_f32_into::<LittleEndian>(&mut bmin)?;
        let mut bmax = [0.0; 3];
        cursor.read_f32_into::<LittleEndian>(&mut bmax)?;
        let walkable_height = cursor.read_f32::<LittleEndian>()?;
        let walkable_radius = cursor.read_f32::<LittleEndian>()?;
        let walkable_climb = cursor.read_f32::<LittleEndian>()?;

        Ok(Self {
            magic,
            version,
            x,
            y,
            layer,
            user_id,
            poly_count,
            vert_count,
            detail_mesh_count,
            detail_vert_count,
            detail_tri_count,
            bmin,
            bmax,
            walkable_height,
            walkable_radius,
            walkable_climb,
        })
    }
}

/// Reads and validates the header at the start of a tile payload
///
/// Checks the magic constant and version before exposing any header
/// fields; payload data past the header is never read.
pub fn read_tile_data_header(data: &[u8]) -> Result<TileDataHeader> {
    if data.len() < TILE_DATA_HEADER_SIZE {
        return Err(Error::InvalidParam(
            "buffer is smaller than a tile payload header".to_string(),
        ));
    }

    let mut cursor = Cursor::new(&data[..TILE_DATA_HEADER_SIZE]);
    let header = TileDataHeader::read_from(&mut cursor)?;

    if header.magic != TILE_DATA_MAGIC {
        return Err(Error::WrongMagic);
    }
    if header.version != TILE_DATA_VERSION {
        return Err(Error::WrongVersion {
            expected: TILE_DATA_VERSION,
            found: header.version,
        });
    }

    Ok(header)
}
