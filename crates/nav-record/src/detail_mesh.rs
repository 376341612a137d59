//! Detail mesh record, its serialization, and flattening
//!
//! Submeshes are built independently, so the record's vertex array holds
//! near-duplicate vertices along submesh seams. Flattening merges those
//! duplicates and remaps the triangle indices onto the compacted vertex
//! set, yielding one globally indexed triangle list.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use nav_common::{sloppy_eq, Error, Result};

/// Current detail mesh record version
pub const POLY_MESH_DETAIL_VERSION: i32 = 1;

/// Serialized header size in bytes
const HEADER_SIZE: usize = 28;

struct PolyMeshDetailHeader {
    nmeshes: i32,
    nverts: i32,
    ntris: i32,
    max_meshes: i32,
    max_verts: i32,
    max_tris: i32,
    version: i32,
}

impl PolyMeshDetailHeader {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_i32::<LittleEndian>(self.nmeshes)?;
        out.write_i32::<LittleEndian>(self.nverts)?;
        out.write_i32::<LittleEndian>(self.ntris)?;
        out.write_i32::<LittleEndian>(self.max_meshes)?;
        out.write_i32::<LittleEndian>(self.max_verts)?;
        out.write_i32::<LittleEndian>(self.max_tris)?;
        out.write_i32::<LittleEndian>(self.version)?;
        Ok(())
    }

    fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        Ok(Self {
            nmeshes: cursor.read_i32::<LittleEndian>()?,
            nverts: cursor.read_i32::<LittleEndian>()?,
            ntris: cursor.read_i32::<LittleEndian>()?,
            max_meshes: cursor.read_i32::<LittleEndian>()?,
            max_verts: cursor.read_i32::<LittleEndian>()?,
            max_tris: cursor.read_i32::<LittleEndian>()?,
            version: cursor.read_i32::<LittleEndian>()?,
        })
    }
}

/// A detail mesh record
#[derive(Debug, Clone, Default)]
pub struct PolyMeshDetail {
    /// Submesh table, 4 entries per submesh:
    /// `[vert base, vert count, tri base, tri count]`
    pub meshes: Vec<u32>,
    /// Mesh vertices `[x,y,z]` * max_verts
    pub verts: Vec<f32>,
    /// Triangles, 4 entries per triangle: 3 local vertex indices + flags
    pub tris: Vec<u8>,
    /// Number of populated submeshes
    pub nmeshes: usize,
    /// Number of populated vertices
    pub nverts: usize,
    /// Number of populated triangles
    pub ntris: usize,
    /// Allocated submesh capacity
    pub max_meshes: usize,
    /// Allocated vertex capacity
    pub max_verts: usize,
    /// Allocated triangle capacity
    pub max_tris: usize,
}

/// A flattened detail mesh: deduplicated vertices and globally indexed
/// triangles
#[derive(Debug, Clone, PartialEq)]
pub struct FlatMesh {
    /// Vertices `[x,y,z]` per entry
    pub verts: Vec<f32>,
    /// Triangle indices, 3 per triangle, referencing `verts`
    pub tris: Vec<u32>,
}

/// Copies unique vertices from `verts` into a compacted array
///
/// Vertices that compare [`sloppy_eq`] on all three axes are merged; the
/// first occurrence of each equivalence class keeps its relative order and
/// determines the compacted index. Returns the compacted vertices and a
/// map from each source index to its compacted index.
pub fn remove_duplicate_verts(verts: &[f32]) -> (Vec<f32>, Vec<usize>) {
    let count = verts.len() / 3;
    let mut unique: Vec<f32> = Vec::with_capacity(verts.len());
    let mut map = Vec::with_capacity(count);

    for i in 0..count {
        let v = &verts[i * 3..i * 3 + 3];
        let existing = (0..unique.len() / 3).find(|&j| {
            let u = &unique[j * 3..j * 3 + 3];
            sloppy_eq(v[0], u[0]) && sloppy_eq(v[1], u[1]) && sloppy_eq(v[2], u[2])
        });

        match existing {
            Some(j) => map.push(j),
            None => {
                map.push(unique.len() / 3);
                unique.extend_from_slice(&verts[i * 3..i * 3 + 3]);
            }
        }
    }

    (unique, map)
}

impl PolyMeshDetail {
    /// Creates an empty record with arrays allocated at the given capacities
    pub fn with_capacity(max_meshes: usize, max_verts: usize, max_tris: usize) -> Self {
        Self {
            meshes: vec![0; max_meshes * 4],
            verts: vec![0.0; max_verts * 3],
            tris: vec![0; max_tris * 4],
            nmeshes: 0,
            nverts: 0,
            ntris: 0,
            max_meshes,
            max_verts,
            max_tris,
        }
    }

    /// Packs the record into one contiguous buffer
    ///
    /// With `include_buffer` set, the full allocated capacity is written;
    /// otherwise only populated elements are. Fails if the record has no
    /// allocated capacity.
    pub fn serialize(&self, include_buffer: bool) -> Result<Vec<u8>> {
        if self.max_meshes == 0 {
            return Err(Error::InvalidParam(
                "cannot serialize a detail mesh with no allocated capacity".to_string(),
            ));
        }
        if self.nmeshes > self.max_meshes
            || self.nverts > self.max_verts
            || self.ntris > self.max_tris
        {
            return Err(Error::InvalidParam(
                "populated counts exceed allocated capacity".to_string(),
            ));
        }

        let mesh_count = if include_buffer { self.max_meshes } else { self.nmeshes };
        let vert_count = if include_buffer { self.max_verts } else { self.nverts };
        let tri_count = if include_buffer { self.max_tris } else { self.ntris };

        if self.meshes.len() < mesh_count * 4
            || self.verts.len() < vert_count * 3
            || self.tris.len() < tri_count * 4
        {
            return Err(Error::InvalidParam(
                "detail mesh arrays are smaller than the counts being serialized".to_string(),
            ));
        }

        let header = PolyMeshDetailHeader {
            nmeshes: self.nmeshes as i32,
            nverts: self.nverts as i32,
            ntris: self.ntris as i32,
            max_meshes: mesh_count as i32,
            max_verts: vert_count as i32,
            max_tris: tri_count as i32,
            version: POLY_MESH_DETAIL_VERSION,
        };

        let total = HEADER_SIZE + mesh_count * 4 * 4 + tri_count * 4 + vert_count * 3 * 4;

        let mut data = Vec::new();
        data.try_reserve_exact(total)?;

        header.write_to(&mut data)?;
        for &m in &self.meshes[..mesh_count * 4] {
            data.write_u32::<LittleEndian>(m)?;
        }
        data.extend_from_slice(&self.tris[..tri_count * 4]);
        for &v in &self.verts[..vert_count * 3] {
            data.write_f32::<LittleEndian>(v)?;
        }

        Ok(data)
    }

    /// Reconstructs a record from a buffer produced by
    /// [`serialize`](PolyMeshDetail::serialize)
    ///
    /// The total length implied by the header is validated before any array
    /// data is read. On failure no record is produced.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidParam(
                "buffer is smaller than the record header".to_string(),
            ));
        }

        let mut cursor = Cursor::new(data);
        let header = PolyMeshDetailHeader::read_from(&mut cursor)?;

        if header.version != POLY_MESH_DETAIL_VERSION {
            return Err(Error::WrongVersion {
                expected: POLY_MESH_DETAIL_VERSION,
                found: header.version,
            });
        }
        if header.nmeshes < 0
            || header.nverts < 0
            || header.ntris < 0
            || header.max_meshes < 0
            || header.max_verts < 0
            || header.max_tris < 0
        {
            return Err(Error::CorruptRecord(
                "detail mesh header holds a negative count".to_string(),
            ));
        }

        let nmeshes = header.nmeshes as usize;
        let nverts = header.nverts as usize;
        let ntris = header.ntris as usize;
        let max_meshes = header.max_meshes as usize;
        let max_verts = header.max_verts as usize;
        let max_tris = header.max_tris as usize;

        if nmeshes > max_meshes || nverts > max_verts || ntris > max_tris {
            return Err(Error::CorruptRecord(
                "populated counts exceed the header capacities".to_string(),
            ));
        }

        let total = HEADER_SIZE + max_meshes * 4 * 4 + max_tris * 4 + max_verts * 3 * 4;
        if data.len() < total {
            return Err(Error::CorruptRecord(format!(
                "buffer holds {} bytes but the header implies {}",
                data.len(),
                total
            )));
        }

        let mut meshes = Vec::new();
        meshes.try_reserve_exact(max_meshes * 4)?;
        meshes.resize(max_meshes * 4, 0);
        cursor.read_u32_into::<LittleEndian>(&mut meshes)?;

        let mut tris = Vec::new();
        tris.try_reserve_exact(max_tris * 4)?;
        tris.resize(max_tris * 4, 0);
        std::io::Read::read_exact(&mut cursor, &mut tris)?;

        let mut verts = Vec::new();
        verts.try_reserve_exact(max_verts * 3)?;
        verts.resize(max_verts * 3, 0.0);
        cursor.read_f32_into::<LittleEndian>(&mut verts)?;

        Ok(Self {
            meshes,
            verts,
            tris,
            nmeshes,
            nverts,
            ntris,
            max_meshes,
            max_verts,
            max_tris,
        })
    }

    /// Checks every submesh entry against the populated array bounds
    ///
    /// A record reconstructed from an untrusted buffer can carry a submesh
    /// table whose base and count fields point outside the vertex and
    /// triangle arrays, or triangles whose local indices fall outside their
    /// submesh. Such a table is corrupt and must never be walked.
    fn validate_submesh_table(&self) -> Result<()> {
        for mesh in 0..self.nmeshes {
            let vert_base = self.meshes[mesh * 4] as u64;
            let vert_count = self.meshes[mesh * 4 + 1] as u64;
            let tri_base = self.meshes[mesh * 4 + 2] as u64;
            let tri_count = self.meshes[mesh * 4 + 3] as u64;

            if vert_base + vert_count > self.nverts as u64
                || tri_base + tri_count > self.ntris as u64
            {
                return Err(Error::CorruptRecord(format!(
                    "submesh {} references data outside the populated arrays",
                    mesh
                )));
            }
            for tri in 0..tri_count as usize {
                let t = (tri_base as usize + tri) * 4;
                if self.tris[t..t + 3].iter().any(|&i| i as u64 >= vert_count) {
                    return Err(Error::CorruptRecord(format!(
                        "submesh {} triangle {} references a vertex outside the submesh",
                        mesh, tri
                    )));
                }
            }
        }
        Ok(())
    }

    /// Flattens the record into one deduplicated, globally indexed mesh
    ///
    /// `max_verts` and `max_tris` bound the output the caller is prepared
    /// to accept; either shortfall is a hard failure and nothing is
    /// produced. A submesh table that points outside the populated arrays
    /// fails with [`Error::CorruptRecord`]. Triangle indices are translated
    /// through the submesh vertex base and the duplicate-vertex map.
    pub fn flatten(&self, max_verts: usize, max_tris: usize) -> Result<FlatMesh> {
        self.validate_submesh_table()?;

        if max_tris < self.ntris {
            return Err(Error::CapacityTooSmall(format!(
                "flatten needs room for {} triangles, caller allows {}",
                self.ntris, max_tris
            )));
        }

        let (unique, vert_map) = remove_duplicate_verts(&self.verts[..self.nverts * 3]);
        let unique_count = unique.len() / 3;
        if max_verts < unique_count {
            return Err(Error::CapacityTooSmall(format!(
                "flatten needs room for {} vertices, caller allows {}",
                unique_count, max_verts
            )));
        }

        let mut tris = Vec::with_capacity(self.ntris * 3);
        for mesh in 0..self.nmeshes {
            let vert_base = self.meshes[mesh * 4] as usize;
            let tri_base = self.meshes[mesh * 4 + 2] as usize;
            let tri_count = self.meshes[mesh * 4 + 3] as usize;
            for tri in 0..tri_count {
                let t = &self.tris[(tri_base + tri) * 4..(tri_base + tri) * 4 + 3];
                for &index in t {
                    tris.push(vert_map[vert_base + index as usize] as u32);
                }
            }
        }

        Ok(FlatMesh { verts: unique, tris })
    }
}
