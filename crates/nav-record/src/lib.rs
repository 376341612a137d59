//! Versioned binary records for navigation mesh build output
//!
//! A mesh record packs a fixed-layout header followed by the record's
//! arrays in a fixed field order into one contiguous buffer, and can be
//! reconstructed from such a buffer later. The polygon mesh and detail
//! mesh record kinds carry independent version numbers and independent
//! binary layouts; a reader rejects any version it was not built for.
//!
//! The detail mesh record additionally supports flattening: merging the
//! near-duplicate vertices produced by independently built submeshes and
//! remapping triangle indices onto the compacted vertex set.

mod detail_mesh;
mod poly_mesh;

pub use detail_mesh::{
    remove_duplicate_verts, FlatMesh, PolyMeshDetail, POLY_MESH_DETAIL_VERSION,
};
pub use poly_mesh::{PolyMesh, MESH_NULL_IDX, POLY_MESH_VERSION};
