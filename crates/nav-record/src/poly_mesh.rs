//! Polygon mesh record and its versioned binary serialization
//!
//! The record keeps its arrays allocated at full capacity with separate
//! populated counts, so a serialized buffer can optionally carry the spare
//! capacity and be reloaded into a reusable, pre-sized record later.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use glam::Vec3;
use nav_common::{Error, Result};

/// Current polygon mesh record version
pub const POLY_MESH_VERSION: i32 = 1;

/// Null index marking the end of a polygon's vertex list
pub const MESH_NULL_IDX: u16 = 0xffff;

/// Serialized header size in bytes
const HEADER_SIZE: usize = 72;

/// Fixed-layout header written ahead of the record arrays
struct PolyMeshHeader {
    nverts: i32,
    npolys: i32,
    max_polys: i32,
    nvp: i32,
    bmin: [f32; 3],
    bmax: [f32; 3],
    cs: f32,
    ch: f32,
    border_size: i32,
    max_verts: i32,
    walkable_height: f32,
    walkable_radius: f32,
    walkable_step: f32,
    version: i32,
}

impl PolyMeshHeader {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_i32::<LittleEndian>(self.nverts)?;
        out.write_i32::<LittleEndian>(self.npolys)?;
        out.write_i32::<LittleEndian>(self.max_polys)?;
        out.write_i32::<LittleEndian>(self.nvp)?;
        for &v in &self.bmin {
            out.write_f32::<LittleEndian>(v)?;
        }
        for &v in &self.bmax {
            out.write_f32::<LittleEndian>(v)?;
        }
        out.write_f32::<LittleEndian>(self.cs)?;
        out.write_f32::<LittleEndian>(self.ch)?;
        out.write_i32::<LittleEndian>(self.border_size)?;
        out.write_i32::<LittleEndian>(self.max_verts)?;
        out.write_f32::<LittleEndian>(self.walkable_height)?;
        out.write_f32::<LittleEndian>(self.walkable_radius)?;
        out.write_f32::<LittleEndian>(self.walkable_step)?;
        out.write_i32::<LittleEndian>(self.version)?;
        Ok(())
    }

    fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let nverts = cursor.read_i32::<LittleEndian>()?;
        let npolys = cursor.read_i32::<LittleEndian>()?;
        let max_polys = cursor.read_i32::<LittleEndian>()?;
        let nvp = cursor.read_i32::<LittleEndian>()?;
        let mut bmin = [0.0; 3];
        cursor.read_f32_into::<LittleEndian>(&mut bmin)?;
        let mut bmax = [0.0; 3];
        cursor.read_f32_into::<LittleEndian>(&mut bmax)?;
        let cs = cursor.read_f32::<LittleEndian>()?;
        let ch = cursor.read_f32::<LittleEndian>()?;
        let border_size = cursor.read_i32::<LittleEndian>()?;
        let max_verts = cursor.read_i32::<LittleEndian>()?;
        let walkable_height = cursor.read_f32::<LittleEndian>()?;
        let walkable_radius = cursor.read_f32::<LittleEndian>()?;
        let walkable_step = cursor.read_f32::<LittleEndian>()?;
        let version = cursor.read_i32::<LittleEndian>()?;

        Ok(Self {
            nverts,
            npolys,
            max_polys,
            nvp,
            bmin,
            bmax,
            cs,
            ch,
            border_size,
            max_verts,
            walkable_height,
            walkable_radius,
            walkable_step,
            version,
        })
    }
}

/// A polygon mesh record
///
/// Arrays are allocated at capacity; `nverts` and `npolys` track how many
/// entries are populated.
#[derive(Debug, Clone)]
pub struct PolyMesh {
    /// Mesh vertices `[x,y,z]` * max_verts
    pub verts: Vec<u16>,
    /// Polygon vertex and neighbor data, `2 * nvp` entries per polygon
    pub polys: Vec<u16>,
    /// Region ID for each polygon
    pub regs: Vec<u16>,
    /// User defined flags for each polygon
    pub flags: Vec<u16>,
    /// Area ID for each polygon
    pub areas: Vec<u8>,
    /// Number of populated vertices
    pub nverts: usize,
    /// Number of populated polygons
    pub npolys: usize,
    /// Allocated polygon capacity
    pub max_polys: usize,
    /// Allocated vertex capacity
    pub max_verts: usize,
    /// Maximum vertices per polygon
    pub nvp: usize,
    /// Minimum bounds of the mesh
    pub bmin: Vec3,
    /// Maximum bounds of the mesh
    pub bmax: Vec3,
    /// Cell size
    pub cs: f32,
    /// Cell height
    pub ch: f32,
    /// Border size used during generation
    pub border_size: i32,
    /// Minimum height where the agent can still walk
    pub walkable_height: f32,
    /// Radius of the agent
    pub walkable_radius: f32,
    /// Maximum ledge height the agent can climb
    pub walkable_step: f32,
}

impl PolyMesh {
    /// Creates an empty mesh with arrays allocated at the given capacities
    pub fn with_capacity(max_verts: usize, max_polys: usize, nvp: usize) -> Self {
        Self {
            verts: vec![0; max_verts * 3],
            polys: vec![MESH_NULL_IDX; max_polys * 2 * nvp],
            regs: vec![0; max_polys],
            flags: vec![0; max_polys],
            areas: vec![0; max_polys],
            nverts: 0,
            npolys: 0,
            max_polys,
            max_verts,
            nvp,
            bmin: Vec3::ZERO,
            bmax: Vec3::ZERO,
            cs: 0.0,
            ch: 0.0,
            border_size: 0,
            walkable_height: 0.0,
            walkable_radius: 0.0,
            walkable_step: 0.0,
        }
    }

    /// Highest vertex index referenced by any populated polygon, plus one
    ///
    /// Used to size the vertex capacity recorded in a serialized header.
    pub fn max_referenced_verts(&self) -> usize {
        let mut max_index = 0;
        for i in 0..self.npolys {
            let p = i * 2 * self.nvp;
            for j in 0..self.nvp {
                let index = self.polys[p + j];
                if index == MESH_NULL_IDX {
                    break;
                }
                max_index = max_index.max(index as usize);
            }
        }
        max_index + 1
    }

    /// Packs the record into one contiguous buffer
    ///
    /// With `include_buffer` set, the full allocated capacity is written so
    /// the output can be reloaded into a pre-sized record; otherwise only
    /// populated elements are written. Fails if the record has no allocated
    /// capacity.
    pub fn serialize(&self, include_buffer: bool) -> Result<Vec<u8>> {
        if self.max_polys == 0 {
            return Err(Error::InvalidParam(
                "cannot serialize a mesh with no allocated capacity".to_string(),
            ));
        }
        if self.npolys > self.max_polys || self.nverts > self.max_verts {
            return Err(Error::InvalidParam(
                "populated counts exceed allocated capacity".to_string(),
            ));
        }

        let poly_count = if include_buffer { self.max_polys } else { self.npolys };
        let vert_count = if include_buffer { self.max_verts } else { self.nverts };

        if self.verts.len() < vert_count * 3
            || self.polys.len() < poly_count * 2 * self.nvp
            || self.regs.len() < poly_count
            || self.flags.len() < poly_count
            || self.areas.len() < poly_count
        {
            return Err(Error::InvalidParam(
                "mesh arrays are smaller than the counts being serialized".to_string(),
            ));
        }

        let header = PolyMeshHeader {
            nverts: self.nverts as i32,
            npolys: self.npolys as i32,
            max_polys: poly_count as i32,
            nvp: self.nvp as i32,
            bmin: self.bmin.to_array(),
            bmax: self.bmax.to_array(),
            cs: self.cs,
            ch: self.ch,
            border_size: self.border_size,
            max_verts: vert_count as i32,
            walkable_height: self.walkable_height,
            walkable_radius: self.walkable_radius,
            walkable_step: self.walkable_step,
            version: POLY_MESH_VERSION,
        };

        let total = HEADER_SIZE
            + vert_count * 3 * 2
            + poly_count * 2 * self.nvp * 2
            + poly_count * 2 * 2
            + poly_count;

        let mut data = Vec::new();
        data.try_reserve_exact(total)?;

        header.write_to(&mut data)?;
        for &v in &self.verts[..vert_count * 3] {
            data.write_u16::<LittleEndian>(v)?;
        }
        for &v in &self.polys[..poly_count * 2 * self.nvp] {
            data.write_u16::<LittleEndian>(v)?;
        }
        for &v in &self.regs[..poly_count] {
            data.write_u16::<LittleEndian>(v)?;
        }
        for &v in &self.flags[..poly_count] {
            data.write_u16::<LittleEndian>(v)?;
        }
        data.extend_from_slice(&self.areas[..poly_count]);

        Ok(data)
    }

    /// Reconstructs a record from a buffer produced by
    /// [`serialize`](PolyMesh::serialize)
    ///
    /// The total length implied by the header is validated before any array
    /// data is read, so a truncated buffer is rejected without touching it.
    /// On failure no record is produced.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidParam(
                "buffer is smaller than the record header".to_string(),
            ));
        }

        let mut cursor = Cursor::new(data);
        let header = PolyMeshHeader::read_from(&mut cursor)?;

        if header.version != POLY_MESH_VERSION {
            return Err(Error::WrongVersion {
                expected: POLY_MESH_VERSION,
                found: header.version,
            });
        }
        if header.nverts < 0
            || header.npolys < 0
            || header.max_polys < 0
            || header.max_verts < 0
            || header.nvp < 1
        {
            return Err(Error::CorruptRecord(
                "polygon mesh header holds a negative count".to_string(),
            ));
        }

        let nverts = header.nverts as usize;
        let npolys = header.npolys as usize;
        let max_polys = header.max_polys as usize;
        let max_verts = header.max_verts as usize;
        let nvp = header.nvp as usize;

        if npolys > max_polys || nverts > max_verts {
            return Err(Error::CorruptRecord(
                "populated counts exceed the header capacities".to_string(),
            ));
        }

        let overflow = || {
            Error::CorruptRecord(
                "header capacities overflow the addressable size".to_string(),
            )
        };
        let vert_len = max_verts.checked_mul(3).ok_or_else(overflow)?;
        let poly_len = max_polys
            .checked_mul(2)
            .and_then(|n| n.checked_mul(nvp))
            .ok_or_else(overflow)?;
        // regs and flags are two bytes per polygon each, areas one byte.
        let total = vert_len
            .checked_mul(2)
            .and_then(|n| n.checked_add(poly_len.checked_mul(2)?))
            .and_then(|n| n.checked_add(max_polys.checked_mul(5)?))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(overflow)?;
        if data.len() < total {
            return Err(Error::CorruptRecord(format!(
                "buffer holds {} bytes but the header implies {}",
                data.len(),
                total
            )));
        }

        let mut verts = Vec::new();
        verts.try_reserve_exact(vert_len)?;
        verts.resize(vert_len, 0);
        cursor.read_u16_into::<LittleEndian>(&mut verts)?;

        let mut polys = Vec::new();
        polys.try_reserve_exact(poly_len)?;
        polys.resize(poly_len, 0);
        cursor.read_u16_into::<LittleEndian>(&mut polys)?;

        let mut regs = Vec::new();
        regs.try_reserve_exact(max_polys)?;
        regs.resize(max_polys, 0);
        cursor.read_u16_into::<LittleEndian>(&mut regs)?;

        let mut flags = Vec::new();
        flags.try_reserve_exact(max_polys)?;
        flags.resize(max_polys, 0);
        cursor.read_u16_into::<LittleEndian>(&mut flags)?;

        let mut areas = Vec::new();
        areas.try_reserve_exact(max_polys)?;
        areas.resize(max_polys, 0);
        std::io::Read::read_exact(&mut cursor, &mut areas)?;

        Ok(Self {
            verts,
            polys,
            regs,
            flags,
            areas,
            nverts,
            npolys,
            max_polys,
            max_verts,
            nvp,
            bmin: Vec3::from_array(header.bmin),
            bmax: Vec3::from_array(header.bmax),
            cs: header.cs,
            ch: header.ch,
            border_size: header.border_size,
            walkable_height: header.walkable_height,
            walkable_radius: header.walkable_radius,
            walkable_step: header.walkable_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mesh() -> PolyMesh {
        let mut mesh = PolyMesh::with_capacity(8, 4, 6);
        mesh.nverts = 4;
        mesh.npolys = 2;
        mesh.verts[..12].copy_from_slice(&[0, 0, 0, 10, 0, 0, 10, 0, 10, 0, 0, 10]);
        // Two triangles over the quad; remaining slots stay MESH_NULL_IDX.
        mesh.polys[0] = 0;
        mesh.polys[1] = 1;
        mesh.polys[2] = 2;
        mesh.polys[12] = 0;
        mesh.polys[13] = 2;
        mesh.polys[14] = 3;
        mesh.regs[0] = 1;
        mesh.regs[1] = 1;
        mesh.flags[0] = 0x01;
        mesh.flags[1] = 0x01;
        mesh.areas[0] = 63;
        mesh.areas[1] = 63;
        mesh.bmin = Vec3::new(0.0, 0.0, 0.0);
        mesh.bmax = Vec3::new(10.0, 1.0, 10.0);
        mesh.cs = 0.3;
        mesh.ch = 0.2;
        mesh.border_size = 2;
        mesh.walkable_height = 2.0;
        mesh.walkable_radius = 0.6;
        mesh.walkable_step = 0.9;
        mesh
    }

    fn read_i32_at(data: &[u8], offset: usize) -> i32 {
        i32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    fn read_f32_at(data: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_header_field_offsets() {
        let mesh = sample_mesh();
        let data = mesh.serialize(true).unwrap();

        assert_eq!(read_i32_at(&data, 0), 4); // nverts
        assert_eq!(read_i32_at(&data, 4), 2); // npolys
        assert_eq!(read_i32_at(&data, 8), 4); // max_polys
        assert_eq!(read_i32_at(&data, 12), 6); // nvp
        assert_eq!(read_f32_at(&data, 16), 0.0); // bmin.x
        assert_eq!(read_f32_at(&data, 28), 10.0); // bmax.x
        assert_eq!(read_f32_at(&data, 40), 0.3); // cs
        assert_eq!(read_f32_at(&data, 44), 0.2); // ch
        assert_eq!(read_i32_at(&data, 48), 2); // border_size
        assert_eq!(read_i32_at(&data, 52), 8); // max_verts
        assert_eq!(read_f32_at(&data, 56), 2.0); // walkable_height
        assert_eq!(read_f32_at(&data, 60), 0.6); // walkable_radius
        assert_eq!(read_f32_at(&data, 64), 0.9); // walkable_step
        assert_eq!(read_i32_at(&data, 68), POLY_MESH_VERSION);
    }

    #[test]
    fn test_round_trip_populated_only() {
        let mesh = sample_mesh();
        let data = mesh.serialize(false).unwrap();
        let restored = PolyMesh::deserialize(&data).unwrap();

        assert_eq!(restored.nverts, mesh.nverts);
        assert_eq!(restored.npolys, mesh.npolys);
        // Without the spare buffer the capacities shrink to the counts.
        assert_eq!(restored.max_polys, mesh.npolys);
        assert_eq!(restored.max_verts, mesh.nverts);
        assert_eq!(restored.verts, mesh.verts[..mesh.nverts * 3]);
        assert_eq!(restored.polys, mesh.polys[..mesh.npolys * 2 * mesh.nvp]);
        assert_eq!(restored.regs, mesh.regs[..mesh.npolys]);
        assert_eq!(restored.flags, mesh.flags[..mesh.npolys]);
        assert_eq!(restored.areas, mesh.areas[..mesh.npolys]);
        assert_eq!(restored.walkable_radius, mesh.walkable_radius);
    }

    #[test]
    fn test_round_trip_with_spare_capacity() {
        let mesh = sample_mesh();
        let data = mesh.serialize(true).unwrap();
        let restored = PolyMesh::deserialize(&data).unwrap();

        assert_eq!(restored.max_polys, mesh.max_polys);
        assert_eq!(restored.max_verts, mesh.max_verts);
        assert_eq!(restored.nverts, mesh.nverts);
        assert_eq!(restored.npolys, mesh.npolys);
        assert_eq!(restored.verts, mesh.verts);
        assert_eq!(restored.polys, mesh.polys);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mesh = PolyMesh::with_capacity(0, 0, 6);
        assert!(matches!(
            mesh.serialize(false),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn test_version_guard() {
        let mesh = sample_mesh();
        let mut data = mesh.serialize(false).unwrap();
        data[68..72].copy_from_slice(&99i32.to_le_bytes());

        assert!(matches!(
            PolyMesh::deserialize(&data),
            Err(Error::WrongVersion { expected, found })
                if expected == POLY_MESH_VERSION && found == 99
        ));
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let mesh = sample_mesh();
        let data = mesh.serialize(true).unwrap();

        assert!(matches!(
            PolyMesh::deserialize(&data[..data.len() - 1]),
            Err(Error::CorruptRecord(_))
        ));
        assert!(matches!(
            PolyMesh::deserialize(&data[..HEADER_SIZE - 4]),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn test_oversized_header_capacities_rejected() {
        let mesh = sample_mesh();
        let mut data = mesh.serialize(true).unwrap();
        // Maximal capacity fields make the implied total exceed usize.
        data[8..12].copy_from_slice(&i32::MAX.to_le_bytes()); // max_polys
        data[12..16].copy_from_slice(&i32::MAX.to_le_bytes()); // nvp

        assert!(matches!(
            PolyMesh::deserialize(&data),
            Err(Error::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_max_referenced_verts() {
        let mesh = sample_mesh();
        assert_eq!(mesh.max_referenced_verts(), 4);

        let empty = PolyMesh::with_capacity(8, 4, 6);
        assert_eq!(empty.max_referenced_verts(), 1);
    }
}
