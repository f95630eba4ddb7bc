//! Fixed, versioned, little-endian wire types for synchronize rounds.

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn cast_slice_from<T: Pod>(v: &[u8]) -> &[T] {
    bytemuck::cast_slice(v)
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the
/// wire. Floats travel as their IEEE-754 bit patterns in `u64`, pre-LE'd
/// with `.to_le()` and decoded with `.from_le()`.

#[inline]
pub fn f64_to_wire(v: f64) -> u64 {
    v.to_bits().to_le()
}

#[inline]
pub fn f64_from_wire(w: u64) -> f64 {
    f64::from_bits(u64::from_le(w))
}

#[inline]
pub fn vec3_to_wire(v: [f64; 3]) -> [u64; 3] {
    [f64_to_wire(v[0]), f64_to_wire(v[1]), f64_to_wire(v[2])]
}

#[inline]
pub fn vec3_from_wire(w: [u64; 3]) -> [f64; 3] {
    [f64_from_wire(w[0]), f64_from_wire(w[1]), f64_from_wire(w[2])]
}

// ===== Common records ======================================================

/// Record count preceding a variable-length payload.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}
impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// Initialize-time announcement from the MBS node to the terrain side:
/// negotiated interface kind and the number of tires in the run.
/// `kind_le`: 1 = BODY, 2 = MESH.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireInitHeader {
    pub version_le: u16,
    pub kind_le: u16,
    pub num_tires_le: u32,
}

impl WireInitHeader {
    pub fn new(kind: u16, num_tires: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            num_tires_le: (num_tires as u32).to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn num_tires(&self) -> usize {
        u32::from_le(self.num_tires_le) as usize
    }
}

// ===== BODY interface ======================================================

/// Full rigid reference-frame state: position, orientation quaternion
/// (w, x, y, z), linear and angular velocity.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireBodyState {
    pub pos_le: [u64; 3],
    pub rot_le: [u64; 4],
    pub lin_vel_le: [u64; 3],
    pub ang_vel_le: [u64; 3],
}

/// Resultant force + torque on a single body.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireWrench {
    pub force_le: [u64; 3],
    pub torque_le: [u64; 3],
}

// ===== MESH interface ======================================================

/// Geometry handshake header: protocol version, interface kind, and the
/// static mesh counts negotiated for the whole run.
/// `kind_le`: 1 = BODY, 2 = MESH.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireMeshHeader {
    pub version_le: u16,
    pub kind_le: u16,
    pub nv_le: u32,
    pub nn_le: u32,
    pub nt_le: u32,
}

impl WireMeshHeader {
    pub fn new(kind: u16, nv: usize, nn: usize, nt: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            nv_le: (nv as u32).to_le(),
            nn_le: (nn as u32).to_le(),
            nt_le: (nt as u32).to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn nv(&self) -> usize {
        u32::from_le(self.nv_le) as usize
    }
    pub fn nn(&self) -> usize {
        u32::from_le(self.nn_le) as usize
    }
    pub fn nt(&self) -> usize {
        u32::from_le(self.nt_le) as usize
    }
}

/// A connectivity triple (vertex or normal indices of one triangle).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireTriple {
    pub idx_le: [u32; 3],
}
impl WireTriple {
    pub fn new(t: [u32; 3]) -> Self {
        Self {
            idx_le: [t[0].to_le(), t[1].to_le(), t[2].to_le()],
        }
    }
    pub fn get(&self) -> [u32; 3] {
        [
            u32::from_le(self.idx_le[0]),
            u32::from_le(self.idx_le[1]),
            u32::from_le(self.idx_le[2]),
        ]
    }
}

/// A bare 3-vector (geometry vertex position or normal).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireVec3 {
    pub v_le: [u64; 3],
}
impl WireVec3 {
    pub fn new(v: [f64; 3]) -> Self {
        Self { v_le: vec3_to_wire(v) }
    }
    pub fn get(&self) -> [f64; 3] {
        vec3_from_wire(self.v_le)
    }
}

/// Per-vertex dynamic state (absolute frame).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireVertexState {
    pub pos_le: [u64; 3],
    pub vel_le: [u64; 3],
}

/// One sparse contact record: vertex index + force vector.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireVertexForce {
    pub index_le: u32,
    pub _pad: u32, // pad to 8-byte alignment (explicit)
    pub force_le: [u64; 3],
}
impl WireVertexForce {
    pub fn new(index: u32, force: [f64; 3]) -> Self {
        Self {
            index_le: index.to_le(),
            _pad: 0,
            force_le: vec3_to_wire(force),
        }
    }
    pub fn index(&self) -> u32 {
        u32::from_le(self.index_le)
    }
    pub fn force(&self) -> [f64; 3] {
        vec3_from_wire(self.force_le)
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    // Pod/Zeroable ensures no padding contains uninit when cast to bytes.
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireInitHeader>() == 8);
    assert!(size_of::<WireBodyState>() == 104);
    assert!(size_of::<WireWrench>() == 48);
    assert!(size_of::<WireMeshHeader>() == 16);
    assert!(size_of::<WireTriple>() == 12);
    assert!(size_of::<WireVec3>() == 24);
    assert!(size_of::<WireVertexState>() == 48);
    assert!(size_of::<WireVertexForce>() == 32);
    assert!(align_of::<WireVertexForce>() == 8);
};

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{cast_slice, cast_slice_mut};

    #[test]
    fn f64_bits_roundtrip() {
        for v in [0.0, -1.5, std::f64::consts::PI, 1e-300] {
            assert_eq!(f64_from_wire(f64_to_wire(v)), v);
        }
    }

    #[test]
    fn roundtrip_vertex_force() {
        let v = vec![
            WireVertexForce::new(3, [1.0, 2.0, 3.0]),
            WireVertexForce::new(7, [-1.0, 0.0, 0.5]),
        ];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let mut out = vec![WireVertexForce::zeroed(); v.len()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].index(), 3);
        assert_eq!(out[1].force(), [-1.0, 0.0, 0.5]);
    }

    #[test]
    fn roundtrip_triple() {
        let t = WireTriple::new([0, 5, 2]);
        let bytes: Vec<u8> = cast_slice(std::slice::from_ref(&t)).to_vec();
        let mut out = [WireTriple::zeroed()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].get(), [0, 5, 2]);
    }

    #[test]
    fn header_version_guard() {
        let hdr = WireMeshHeader::new(2, 4, 4, 2);
        assert_eq!(hdr.version(), WIRE_VERSION);
        assert_eq!(hdr.kind(), 2);
        assert_eq!((hdr.nv(), hdr.nn(), hdr.nt()), (4, 4, 2));
    }
}
