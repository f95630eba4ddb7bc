//! Exchangeable data shapes for the BODY and MESH interface contracts.
//!
//! BODY moves a single rigid reference frame plus one resultant wrench
//! per tire; MESH moves per-vertex state out and sparse per-vertex
//! contact forces back. Geometry is static for the run and crosses the
//! wire exactly once, during the initialize handshake.

use crate::cosim_error::CosimError;

/// Type of the tire-terrain communication interface, fixed per pairing
/// for the whole run.
///
/// - `Body`: communication at the wheel-spindle level. Use for a rigid
///   tire or when the terrain node also performs flexible-tire dynamics.
/// - `Mesh`: communication at the tire-mesh level. Required whenever
///   tire deformation is computed outside the terrain node, since only
///   vertex-level state carries enough information for distributed
///   contact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InterfaceKind {
    Body,
    Mesh,
}

impl InterfaceKind {
    pub(crate) const fn wire_code(self) -> u16 {
        match self {
            InterfaceKind::Body => 1,
            InterfaceKind::Mesh => 2,
        }
    }

    pub(crate) fn from_wire_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(InterfaceKind::Body),
            2 => Some(InterfaceKind::Mesh),
            _ => None,
        }
    }
}

/// Full state of a single rigid reference frame (wheel spindle).
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BodyState {
    /// Position in the absolute frame.
    pub pos: [f64; 3],
    /// Orientation quaternion (w, x, y, z), unit by convention.
    pub rot: [f64; 4],
    pub lin_vel: [f64; 3],
    pub ang_vel: [f64; 3],
}

impl Default for BodyState {
    fn default() -> Self {
        BodyState {
            pos: [0.0; 3],
            rot: [1.0, 0.0, 0.0, 0.0],
            lin_vel: [0.0; 3],
            ang_vel: [0.0; 3],
        }
    }
}

/// Resultant force and torque acting on a single body.
#[derive(Copy, Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Wrench {
    pub force: [f64; 3],
    pub torque: [f64; 3],
}

/// Static mesh description, set once per run (node-local frame).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshGeometry {
    verts: Vec<[f64; 3]>,
    norms: Vec<[f64; 3]>,
    idx_verts: Vec<[u32; 3]>,
    idx_norms: Vec<[u32; 3]>,
}

impl MeshGeometry {
    /// Build a geometry, validating that every connectivity triple
    /// references a valid vertex/normal range.
    pub fn new(
        verts: Vec<[f64; 3]>,
        norms: Vec<[f64; 3]>,
        idx_verts: Vec<[u32; 3]>,
        idx_norms: Vec<[u32; 3]>,
    ) -> Result<Self, CosimError> {
        if idx_verts.len() != idx_norms.len() {
            return Err(CosimError::MeshIndex(format!(
                "triangle count mismatch: {} vertex triples vs {} normal triples",
                idx_verts.len(),
                idx_norms.len()
            )));
        }
        let nv = verts.len() as u32;
        let nn = norms.len() as u32;
        for (t, triple) in idx_verts.iter().enumerate() {
            if triple.iter().any(|&i| i >= nv) {
                return Err(CosimError::MeshIndex(format!(
                    "triangle {t}: vertex index out of range [0, {nv})"
                )));
            }
        }
        for (t, triple) in idx_norms.iter().enumerate() {
            if triple.iter().any(|&i| i >= nn) {
                return Err(CosimError::MeshIndex(format!(
                    "triangle {t}: normal index out of range [0, {nn})"
                )));
            }
        }
        Ok(MeshGeometry {
            verts,
            norms,
            idx_verts,
            idx_norms,
        })
    }

    /// Number of vertices.
    pub fn nv(&self) -> usize {
        self.verts.len()
    }
    /// Number of normals.
    pub fn nn(&self) -> usize {
        self.norms.len()
    }
    /// Number of triangles.
    pub fn nt(&self) -> usize {
        self.idx_verts.len()
    }

    pub fn verts(&self) -> &[[f64; 3]] {
        &self.verts
    }
    pub fn norms(&self) -> &[[f64; 3]] {
        &self.norms
    }
    pub fn idx_verts(&self) -> &[[u32; 3]] {
        &self.idx_verts
    }
    pub fn idx_norms(&self) -> &[[u32; 3]] {
        &self.idx_norms
    }
}

/// Per-vertex dynamic state, produced every synchronize by the
/// mesh-owning node (absolute frame).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshState {
    pub vpos: Vec<[f64; 3]>,
    pub vvel: Vec<[f64; 3]>,
}

impl MeshState {
    /// Number of vertices carried by this state.
    pub fn len(&self) -> usize {
        self.vpos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vpos.is_empty()
    }

    /// Check this state against the negotiated geometry.
    pub fn validate(&self, geometry: &MeshGeometry) -> Result<(), CosimError> {
        if self.vpos.len() != geometry.nv() || self.vvel.len() != geometry.nv() {
            return Err(CosimError::MeshIndex(format!(
                "mesh state length {}/{} does not match geometry vertex count {}",
                self.vpos.len(),
                self.vvel.len(),
                geometry.nv()
            )));
        }
        Ok(())
    }
}

/// Sparse contact forces on a subset of mesh vertices, produced every
/// synchronize by the terrain node.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshContact {
    /// Indices of vertices experiencing contact forces.
    pub vidx: Vec<u32>,
    /// Contact force per listed vertex.
    pub vforce: Vec<[f64; 3]>,
}

impl MeshContact {
    /// Number of vertices in contact.
    pub fn len(&self) -> usize {
        self.vidx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vidx.is_empty()
    }

    /// Check index range and sparsity against the vertex count of the
    /// negotiated geometry.
    pub fn validate(&self, nv: usize) -> Result<(), CosimError> {
        if self.vidx.len() != self.vforce.len() {
            return Err(CosimError::MeshIndex(format!(
                "contact lists disagree: {} indices vs {} forces",
                self.vidx.len(),
                self.vforce.len()
            )));
        }
        if self.vidx.len() > nv {
            return Err(CosimError::MeshIndex(format!(
                "contact vertex count {} exceeds mesh vertex count {nv}",
                self.vidx.len()
            )));
        }
        if let Some(&bad) = self.vidx.iter().find(|&&i| i as usize >= nv) {
            return Err(CosimError::MeshIndex(format!(
                "contact vertex index {bad} out of range [0, {nv})"
            )));
        }
        Ok(())
    }
}
