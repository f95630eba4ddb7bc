//! MESH interface rounds and the one-time geometry handshake.
//!
//! Geometry is static for the run: the mesh-owning node pushes it to its
//! terrain counterpart exactly once, during initialize, together with the
//! negotiated interface kind. Every later synchronize moves the full
//! per-vertex state out and a sparse contact list back. All receive
//! paths validate payload sizes against the negotiated vertex count; a
//! mismatch aborts the run.

use crate::comm::{CommTag, Communicator, Wait};
use crate::cosim_error::CosimError;
use crate::exchange::data::{InterfaceKind, MeshContact, MeshGeometry, MeshState};
use crate::exchange::wire::{
    WIRE_VERSION, WireCount, WireMeshHeader, WireTriple, WireVec3, WireVertexForce,
    WireVertexState, cast_slice, cast_slice_mut, vec3_from_wire, vec3_to_wire,
};
use crate::exchange::{TAG_GEOMETRY, TAG_MESH_CONTACT, TAG_MESH_STATE};
use bytemuck::Zeroable;

/// Tag lane for the geometry header of tire `lane`; payload travels on
/// the next tag.
fn geometry_tags(lane: u16) -> (CommTag, CommTag) {
    (TAG_GEOMETRY.offset(2 * lane), TAG_GEOMETRY.offset(2 * lane + 1))
}

/// Tag lane for the contact count of tire `lane`; records travel on the
/// next tag.
fn contact_tags(lane: u16) -> (CommTag, CommTag) {
    (
        TAG_MESH_CONTACT.offset(2 * lane),
        TAG_MESH_CONTACT.offset(2 * lane + 1),
    )
}

fn geometry_payload_len(nv: usize, nn: usize, nt: usize) -> usize {
    nv * std::mem::size_of::<WireVec3>()
        + nn * std::mem::size_of::<WireVec3>()
        + 2 * nt * std::mem::size_of::<WireTriple>()
}

fn copy_into<T: bytemuck::Pod + Zeroable>(bytes: &[u8], count: usize) -> Vec<T> {
    let mut out = vec![T::zeroed(); count];
    cast_slice_mut(&mut out).copy_from_slice(bytes);
    out
}

/// Mesh-owner side of the initialize handshake: push the static geometry
/// and the interface kind to the terrain counterpart.
pub fn send_geometry<C: Communicator>(
    comm: &C,
    peer: usize,
    kind: InterfaceKind,
    geometry: &MeshGeometry,
    lane: u16,
) -> Result<(), CosimError> {
    let (hdr_tag, payload_tag) = geometry_tags(lane);
    let hdr = WireMeshHeader::new(kind.wire_code(), geometry.nv(), geometry.nn(), geometry.nt());

    let mut payload = Vec::with_capacity(geometry_payload_len(
        geometry.nv(),
        geometry.nn(),
        geometry.nt(),
    ));
    let verts: Vec<WireVec3> = geometry.verts().iter().map(|&v| WireVec3::new(v)).collect();
    let norms: Vec<WireVec3> = geometry.norms().iter().map(|&v| WireVec3::new(v)).collect();
    let idx_v: Vec<WireTriple> = geometry.idx_verts().iter().map(|&t| WireTriple::new(t)).collect();
    let idx_n: Vec<WireTriple> = geometry.idx_norms().iter().map(|&t| WireTriple::new(t)).collect();
    payload.extend_from_slice(cast_slice(&verts));
    payload.extend_from_slice(cast_slice(&norms));
    payload.extend_from_slice(cast_slice(&idx_v));
    payload.extend_from_slice(cast_slice(&idx_n));

    let h1 = comm.isend(peer, hdr_tag.as_u16(), cast_slice(std::slice::from_ref(&hdr)));
    let h2 = comm.isend(peer, payload_tag.as_u16(), &payload);
    let _ = h1.wait();
    let _ = h2.wait();
    log::debug!(
        "geometry handshake sent to rank {peer}: kind={kind:?} nv={} nn={} nt={}",
        geometry.nv(),
        geometry.nn(),
        geometry.nt()
    );
    Ok(())
}

/// Terrain side of the initialize handshake: receive the static geometry
/// and the negotiated interface kind from the mesh owner.
pub fn recv_geometry<C: Communicator>(
    comm: &C,
    peer: usize,
    lane: u16,
) -> Result<(InterfaceKind, MeshGeometry), CosimError> {
    let (hdr_tag, payload_tag) = geometry_tags(lane);

    let mut hdr_buf = vec![0u8; std::mem::size_of::<WireMeshHeader>()];
    let h = comm.irecv(peer, hdr_tag.as_u16(), &mut hdr_buf);
    let data = h
        .wait()
        .ok_or_else(|| CosimError::transport(peer, "geometry header receive returned no data"))?;
    if data.len() != std::mem::size_of::<WireMeshHeader>() {
        return Err(CosimError::PayloadSize {
            peer,
            expected: std::mem::size_of::<WireMeshHeader>(),
            actual: data.len(),
        });
    }
    let mut hdr: WireMeshHeader = WireMeshHeader::zeroed();
    cast_slice_mut(std::slice::from_mut(&mut hdr)).copy_from_slice(&data);

    if hdr.version() != WIRE_VERSION {
        return Err(CosimError::transport(
            peer,
            format!(
                "geometry header version {} does not match {}",
                hdr.version(),
                WIRE_VERSION
            ),
        ));
    }
    let kind = InterfaceKind::from_wire_code(hdr.kind()).ok_or_else(|| {
        CosimError::transport(peer, format!("unknown interface kind code {}", hdr.kind()))
    })?;

    let (nv, nn, nt) = (hdr.nv(), hdr.nn(), hdr.nt());
    let expected = geometry_payload_len(nv, nn, nt);
    let mut payload_buf = vec![0u8; expected];
    let h = comm.irecv(peer, payload_tag.as_u16(), &mut payload_buf);
    let payload = h
        .wait()
        .ok_or_else(|| CosimError::transport(peer, "geometry payload receive returned no data"))?;
    if payload.len() != expected {
        return Err(CosimError::PayloadSize {
            peer,
            expected,
            actual: payload.len(),
        });
    }

    let sz_v3 = std::mem::size_of::<WireVec3>();
    let sz_tri = std::mem::size_of::<WireTriple>();
    let (verts_b, rest) = payload.split_at(nv * sz_v3);
    let (norms_b, rest) = rest.split_at(nn * sz_v3);
    let (idx_v_b, idx_n_b) = rest.split_at(nt * sz_tri);

    let verts: Vec<[f64; 3]> = copy_into::<WireVec3>(verts_b, nv).iter().map(|w| w.get()).collect();
    let norms: Vec<[f64; 3]> = copy_into::<WireVec3>(norms_b, nn).iter().map(|w| w.get()).collect();
    let idx_verts: Vec<[u32; 3]> =
        copy_into::<WireTriple>(idx_v_b, nt).iter().map(|w| w.get()).collect();
    let idx_norms: Vec<[u32; 3]> =
        copy_into::<WireTriple>(idx_n_b, nt).iter().map(|w| w.get()).collect();

    let geometry = MeshGeometry::new(verts, norms, idx_verts, idx_norms)?;
    log::debug!(
        "geometry handshake received from rank {peer}: kind={kind:?} nv={nv} nn={nn} nt={nt}"
    );
    Ok((kind, geometry))
}

/// Mesh-owner side of a MESH round: push the full per-vertex state to
/// the terrain counterpart and collect the sparse contact reply.
pub fn exchange_state_for_contact<C: Communicator>(
    comm: &C,
    peer: usize,
    state: &MeshState,
    nv: usize,
    lane: u16,
) -> Result<MeshContact, CosimError> {
    if state.vpos.len() != nv || state.vvel.len() != nv {
        return Err(CosimError::MeshIndex(format!(
            "mesh state length {}/{} does not match negotiated vertex count {nv}",
            state.vpos.len(),
            state.vvel.len()
        )));
    }
    let (count_tag, records_tag) = contact_tags(lane);

    // Post the contact-count receive before sending our state.
    let mut count_buf = vec![0u8; std::mem::size_of::<WireCount>()];
    let count_handle = comm.irecv(peer, count_tag.as_u16(), &mut count_buf);

    let wire_state: Vec<WireVertexState> = state
        .vpos
        .iter()
        .zip(&state.vvel)
        .map(|(&p, &v)| WireVertexState {
            pos_le: vec3_to_wire(p),
            vel_le: vec3_to_wire(v),
        })
        .collect();
    let send = comm.isend(peer, TAG_MESH_STATE.offset(lane).as_u16(), cast_slice(&wire_state));
    let _ = send.wait();

    let data = count_handle
        .wait()
        .ok_or_else(|| CosimError::transport(peer, "contact count receive returned no data"))?;
    if data.len() != std::mem::size_of::<WireCount>() {
        return Err(CosimError::PayloadSize {
            peer,
            expected: std::mem::size_of::<WireCount>(),
            actual: data.len(),
        });
    }
    let mut cnt: WireCount = WireCount::zeroed();
    cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
    let n = cnt.get();
    if n > nv {
        return Err(CosimError::MeshIndex(format!(
            "contact vertex count {n} exceeds mesh vertex count {nv}"
        )));
    }

    let expected = n * std::mem::size_of::<WireVertexForce>();
    let mut rec_buf = vec![0u8; expected];
    let h = comm.irecv(peer, records_tag.as_u16(), &mut rec_buf);
    let records = h
        .wait()
        .ok_or_else(|| CosimError::transport(peer, "contact records receive returned no data"))?;
    if records.len() != expected {
        return Err(CosimError::PayloadSize {
            peer,
            expected,
            actual: records.len(),
        });
    }

    let wire: Vec<WireVertexForce> = copy_into(&records, n);
    let contact = MeshContact {
        vidx: wire.iter().map(|w| w.index()).collect(),
        vforce: wire.iter().map(|w| w.force()).collect(),
    };
    contact.validate(nv)?;
    Ok(contact)
}

/// Terrain side, stage 1: receive the full per-vertex state from the
/// mesh owner, validating its length against the negotiated geometry.
pub fn recv_mesh_state<C: Communicator>(
    comm: &C,
    peer: usize,
    nv: usize,
    lane: u16,
) -> Result<MeshState, CosimError> {
    let expected = nv * std::mem::size_of::<WireVertexState>();
    let mut buf = vec![0u8; expected];
    let h = comm.irecv(peer, TAG_MESH_STATE.offset(lane).as_u16(), &mut buf);
    let data = h
        .wait()
        .ok_or_else(|| CosimError::transport(peer, "mesh state receive returned no data"))?;
    if data.len() != expected {
        return Err(CosimError::PayloadSize {
            peer,
            expected,
            actual: data.len(),
        });
    }
    let wire: Vec<WireVertexState> = copy_into(&data, nv);
    Ok(MeshState {
        vpos: wire.iter().map(|w| vec3_from_wire(w.pos_le)).collect(),
        vvel: wire.iter().map(|w| vec3_from_wire(w.vel_le)).collect(),
    })
}

/// Terrain side, stage 2: send the sparse contact list back to the
/// mesh owner. The contact is validated against `nv` before any bytes
/// leave this node.
pub fn send_mesh_contact<C: Communicator>(
    comm: &C,
    peer: usize,
    contact: &MeshContact,
    nv: usize,
    lane: u16,
) -> Result<(), CosimError> {
    contact.validate(nv)?;
    let (count_tag, records_tag) = contact_tags(lane);

    let cnt = WireCount::new(contact.len());
    let records: Vec<WireVertexForce> = contact
        .vidx
        .iter()
        .zip(&contact.vforce)
        .map(|(&i, &f)| WireVertexForce::new(i, f))
        .collect();

    let h1 = comm.isend(peer, count_tag.as_u16(), cast_slice(std::slice::from_ref(&cnt)));
    let h2 = comm.isend(peer, records_tag.as_u16(), cast_slice(&records));
    let _ = h1.wait();
    let _ = h2.wait();
    Ok(())
}
