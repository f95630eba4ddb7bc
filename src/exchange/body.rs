//! BODY interface rounds: spindle state out, resultant wrench back.
//!
//! All helpers post receives before sends and drain every handle before
//! returning, so a transport error never strands a peer's buffer.

use crate::comm::{Communicator, Wait};
use crate::cosim_error::CosimError;
use crate::exchange::data::{BodyState, Wrench};
use crate::exchange::wire::{
    WireBodyState, WireWrench, cast_slice, cast_slice_mut, f64_from_wire, vec3_from_wire,
    vec3_to_wire,
};
use crate::exchange::{TAG_BODY_FORCE, TAG_BODY_STATE};

fn encode_state(s: &BodyState) -> WireBodyState {
    WireBodyState {
        pos_le: vec3_to_wire(s.pos),
        rot_le: [
            s.rot[0].to_bits().to_le(),
            s.rot[1].to_bits().to_le(),
            s.rot[2].to_bits().to_le(),
            s.rot[3].to_bits().to_le(),
        ],
        lin_vel_le: vec3_to_wire(s.lin_vel),
        ang_vel_le: vec3_to_wire(s.ang_vel),
    }
}

fn decode_state(w: &WireBodyState) -> BodyState {
    BodyState {
        pos: vec3_from_wire(w.pos_le),
        rot: [
            f64_from_wire(w.rot_le[0]),
            f64_from_wire(w.rot_le[1]),
            f64_from_wire(w.rot_le[2]),
            f64_from_wire(w.rot_le[3]),
        ],
        lin_vel: vec3_from_wire(w.lin_vel_le),
        ang_vel: vec3_from_wire(w.ang_vel_le),
    }
}

fn encode_wrench(w: &Wrench) -> WireWrench {
    WireWrench {
        force_le: vec3_to_wire(w.force),
        torque_le: vec3_to_wire(w.torque),
    }
}

fn decode_wrench(w: &WireWrench) -> Wrench {
    Wrench {
        force: vec3_from_wire(w.force_le),
        torque: vec3_from_wire(w.torque_le),
    }
}

/// Body-owner half of a BODY round: send one spindle state per tire to
/// `peer` and collect the resultant wrench for each, in tire order.
pub fn exchange_states_for_wrenches<C: Communicator>(
    comm: &C,
    peer: usize,
    states: &[BodyState],
) -> Result<Vec<Wrench>, CosimError> {
    // 1) post all wrench receives
    let mut pending = Vec::with_capacity(states.len());
    for i in 0..states.len() {
        let mut buf = vec![0u8; std::mem::size_of::<WireWrench>()];
        let h = comm.irecv(peer, TAG_BODY_FORCE.offset(i as u16).as_u16(), &mut buf);
        pending.push(h);
    }

    // 2) send all states, keeping wire buffers alive until the sends drain
    let mut sends = Vec::with_capacity(states.len());
    let wire_states: Vec<WireBodyState> = states.iter().map(encode_state).collect();
    for (i, ws) in wire_states.iter().enumerate() {
        sends.push(comm.isend(
            peer,
            TAG_BODY_STATE.offset(i as u16).as_u16(),
            cast_slice(std::slice::from_ref(ws)),
        ));
    }
    for s in sends {
        let _ = s.wait();
    }

    // 3) wait for all wrenches, validating payload sizes
    let mut wrenches = Vec::with_capacity(states.len());
    let mut maybe_err = None;
    for h in pending {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireWrench>() => {
                if maybe_err.is_none() {
                    let mut ww = WireWrench {
                        force_le: [0; 3],
                        torque_le: [0; 3],
                    };
                    cast_slice_mut(std::slice::from_mut(&mut ww)).copy_from_slice(&data);
                    wrenches.push(decode_wrench(&ww));
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(CosimError::PayloadSize {
                    peer,
                    expected: std::mem::size_of::<WireWrench>(),
                    actual: data.len(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(CosimError::transport(
                    peer,
                    "wrench receive returned no data",
                ));
            }
            _ => {} // already failing; just drain
        }
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(wrenches),
    }
}

/// Terrain half, stage 1: collect one spindle state per tire from `peer`.
pub fn recv_body_states<C: Communicator>(
    comm: &C,
    peer: usize,
    num_tires: usize,
) -> Result<Vec<BodyState>, CosimError> {
    let mut pending = Vec::with_capacity(num_tires);
    for i in 0..num_tires {
        let mut buf = vec![0u8; std::mem::size_of::<WireBodyState>()];
        let h = comm.irecv(peer, TAG_BODY_STATE.offset(i as u16).as_u16(), &mut buf);
        pending.push(h);
    }

    let mut states = Vec::with_capacity(num_tires);
    let mut maybe_err = None;
    for h in pending {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireBodyState>() => {
                if maybe_err.is_none() {
                    let mut ws: WireBodyState = bytemuck::Zeroable::zeroed();
                    cast_slice_mut(std::slice::from_mut(&mut ws)).copy_from_slice(&data);
                    states.push(decode_state(&ws));
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(CosimError::PayloadSize {
                    peer,
                    expected: std::mem::size_of::<WireBodyState>(),
                    actual: data.len(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(CosimError::transport(
                    peer,
                    "body state receive returned no data",
                ));
            }
            _ => {}
        }
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(states),
    }
}

/// Terrain half, stage 2: send the computed wrench for each tire back to
/// `peer`, in tire order.
pub fn send_wrenches<C: Communicator>(
    comm: &C,
    peer: usize,
    wrenches: &[Wrench],
) -> Result<(), CosimError> {
    let wire: Vec<WireWrench> = wrenches.iter().map(encode_wrench).collect();
    let mut sends = Vec::with_capacity(wire.len());
    for (i, ww) in wire.iter().enumerate() {
        sends.push(comm.isend(
            peer,
            TAG_BODY_FORCE.offset(i as u16).as_u16(),
            cast_slice(std::slice::from_ref(ww)),
        ));
    }
    for s in sends {
        let _ = s.wait();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codec_roundtrip() {
        let s = BodyState {
            pos: [1.0, -2.0, 3.5],
            rot: [0.5, 0.5, 0.5, 0.5],
            lin_vel: [10.0, 0.0, 0.0],
            ang_vel: [0.0, 31.4, 0.0],
        };
        assert_eq!(decode_state(&encode_state(&s)), s);
    }

    #[test]
    fn wrench_codec_roundtrip() {
        let w = Wrench {
            force: [0.0, 0.0, -9.81],
            torque: [1.0, 0.0, 0.0],
        };
        assert_eq!(decode_wrench(&encode_wrench(&w)), w);
    }
}
