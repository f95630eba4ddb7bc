//! Interface contract (BODY / MESH) data exchange.
//!
//! The interface kind is negotiated once, during the initialize
//! handshake, and is fixed for the run. Each synchronize round then
//! moves either one spindle state / wrench pair per tire (BODY) or one
//! full per-vertex state / sparse contact pair (MESH). Per-step
//! idempotence is the driver's responsibility; nothing here
//! deduplicates a repeated round.

pub mod body;
pub mod data;
pub mod mesh;
pub mod wire;

use crate::comm::{CommTag, Communicator, Wait};
use crate::cosim_error::CosimError;
use crate::exchange::wire::{WIRE_VERSION, WireInitHeader, cast_slice, cast_slice_mut};
use bytemuck::Zeroable;

/// Tag for the initialize-time announcement (interface kind + tire
/// count) from the MBS node to the terrain side.
pub const TAG_INIT: CommTag = CommTag::new(1);
/// Tag band for the one-time geometry handshake (two tags per tire:
/// header, payload).
pub const TAG_GEOMETRY: CommTag = CommTag::new(10);
/// Tag band for spindle states, one lane per tire.
pub const TAG_BODY_STATE: CommTag = CommTag::new(100);
/// Tag band for spindle wrenches, one lane per tire.
pub const TAG_BODY_FORCE: CommTag = CommTag::new(200);
/// Tag band for full mesh vertex states, one lane per tire.
pub const TAG_MESH_STATE: CommTag = CommTag::new(300);
/// Tag band for sparse contact replies (two tags per tire: count,
/// records).
pub const TAG_MESH_CONTACT: CommTag = CommTag::new(400);

pub use data::{BodyState, InterfaceKind, MeshContact, MeshGeometry, MeshState, Wrench};

/// MBS side of the initialize announcement: declare the interface kind
/// and the number of tires to the terrain counterpart.
pub fn send_init_header<C: Communicator>(
    comm: &C,
    peer: usize,
    kind: InterfaceKind,
    num_tires: usize,
) -> Result<(), CosimError> {
    let hdr = WireInitHeader::new(kind.wire_code(), num_tires);
    let h = comm.isend(peer, TAG_INIT.as_u16(), cast_slice(std::slice::from_ref(&hdr)));
    let _ = h.wait();
    Ok(())
}

/// Terrain side of the initialize announcement.
pub fn recv_init_header<C: Communicator>(
    comm: &C,
    peer: usize,
) -> Result<(InterfaceKind, usize), CosimError> {
    let mut buf = vec![0u8; std::mem::size_of::<WireInitHeader>()];
    let h = comm.irecv(peer, TAG_INIT.as_u16(), &mut buf);
    let data = h
        .wait()
        .ok_or_else(|| CosimError::transport(peer, "init header receive returned no data"))?;
    if data.len() != std::mem::size_of::<WireInitHeader>() {
        return Err(CosimError::PayloadSize {
            peer,
            expected: std::mem::size_of::<WireInitHeader>(),
            actual: data.len(),
        });
    }
    let mut hdr: WireInitHeader = WireInitHeader::zeroed();
    cast_slice_mut(std::slice::from_mut(&mut hdr)).copy_from_slice(&data);
    if hdr.version() != WIRE_VERSION {
        return Err(CosimError::transport(
            peer,
            format!(
                "init header version {} does not match {}",
                hdr.version(),
                WIRE_VERSION
            ),
        ));
    }
    let kind = InterfaceKind::from_wire_code(hdr.kind()).ok_or_else(|| {
        CosimError::transport(peer, format!("unknown interface kind code {}", hdr.kind()))
    })?;
    Ok((kind, hdr.num_tires()))
}
