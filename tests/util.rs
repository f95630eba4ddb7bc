//! Shared stubs for the protocol integration tests: a message-counting
//! communicator wrapper and minimal physics backends for each role.
#![allow(dead_code)]

use cosim_node::comm::Communicator;
use cosim_node::exchange::{BodyState, MeshContact, MeshGeometry, MeshState, Wrench};
use cosim_node::node::{BackendError, MbsBackend, TerrainBackend, TireBackend};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts isend/irecv calls made through an inner communicator, so
/// tests can assert which lifecycle phase produced traffic.
pub struct CountingComm<C: Communicator> {
    inner: C,
    pub sends: Arc<AtomicUsize>,
    pub recvs: Arc<AtomicUsize>,
}

impl<C: Communicator> CountingComm<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            sends: Arc::new(AtomicUsize::new(0)),
            recvs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.sends.clone(), self.recvs.clone())
    }
}

impl<C: Communicator> Communicator for CountingComm<C> {
    type SendHandle = C::SendHandle;
    type RecvHandle = C::RecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.inner.isend(peer, tag, buf)
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        self.recvs.fetch_add(1, Ordering::SeqCst);
        self.inner.irecv(peer, tag, buf)
    }

    fn rank(&self) -> usize {
        self.inner.rank()
    }
    fn size(&self) -> usize {
        self.inner.size()
    }
}

/// Snapshot of the counters, for delta assertions around a call.
pub fn snapshot(sends: &AtomicUsize, recvs: &AtomicUsize) -> (usize, usize) {
    (sends.load(Ordering::SeqCst), recvs.load(Ordering::SeqCst))
}

/// Minimal vehicle model: spindles ride at fixed lateral offsets and
/// sink under applied wrenches, enough to give each tire a distinct,
/// predictable state.
pub struct RigVehicle {
    pub num_tires: usize,
    pub heights: Vec<f64>,
    pub applied: Vec<Vec<Wrench>>,
    pub advances: usize,
}

impl RigVehicle {
    pub fn new(num_tires: usize) -> Self {
        Self {
            num_tires,
            heights: vec![0.5; num_tires],
            applied: vec![Vec::new(); num_tires],
            advances: 0,
        }
    }
}

impl MbsBackend for RigVehicle {
    fn num_tires(&self) -> usize {
        self.num_tires
    }

    fn spindle_state(&self, tire: usize) -> BodyState {
        BodyState {
            pos: [tire as f64, 0.0, self.heights[tire]],
            lin_vel: [10.0, 0.0, 0.0],
            ..BodyState::default()
        }
    }

    fn apply_spindle_wrench(&mut self, tire: usize, wrench: Wrench) {
        self.applied[tire].push(wrench);
    }

    fn advance(&mut self, step_size: f64) -> Result<(), BackendError> {
        for h in &mut self.heights {
            *h -= 0.01 * step_size;
        }
        self.advances += 1;
        Ok(())
    }

    fn output_data(&mut self, frame: u32, dir: &Path) -> Result<(), BackendError> {
        let path = cosim_node::output::output_filename(
            &dir.display().to_string(),
            "vehicle",
            "dat",
            frame,
            4,
        );
        std::fs::write(path, format!("{:?}\n", self.heights))?;
        Ok(())
    }

    fn write_checkpoint(&self, path: &Path) -> Result<(), BackendError> {
        std::fs::write(path, format!("advances {}\n", self.advances))?;
        Ok(())
    }
}

/// Flat terrain: the wrench on a spindle is a function of the tire
/// index only, and mesh contact pushes up on every vertex below z = 0.
pub struct FlatTerrain {
    pub geometries: Vec<MeshGeometry>,
    pub body_rounds: usize,
    pub advances: usize,
}

impl FlatTerrain {
    pub fn new() -> Self {
        Self {
            geometries: Vec::new(),
            body_rounds: 0,
            advances: 0,
        }
    }

    pub fn expected_wrench(tire: usize) -> Wrench {
        Wrench {
            force: [0.0, 0.0, 100.0 * (tire as f64 + 1.0)],
            torque: [0.0, tire as f64, 0.0],
        }
    }
}

impl TerrainBackend for FlatTerrain {
    fn register_geometry(
        &mut self,
        _tire: usize,
        geometry: &MeshGeometry,
    ) -> Result<(), BackendError> {
        self.geometries.push(geometry.clone());
        Ok(())
    }

    fn spindle_wrench(&mut self, tire: usize, _state: &BodyState) -> Wrench {
        self.body_rounds += 1;
        Self::expected_wrench(tire)
    }

    fn mesh_contact(&mut self, _tire: usize, state: &MeshState) -> MeshContact {
        let mut contact = MeshContact::default();
        for (i, p) in state.vpos.iter().enumerate() {
            if p[2] < 0.0 {
                contact.vidx.push(i as u32);
                contact.vforce.push([0.0, 0.0, -p[2]]);
            }
        }
        contact
    }

    fn advance(&mut self, _step_size: f64) -> Result<(), BackendError> {
        self.advances += 1;
        Ok(())
    }

    fn output_data(&mut self, _frame: u32, _dir: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Four-vertex tire patch that follows the spindle height; the two
/// leading vertices ride below it so the flat terrain always touches
/// them.
pub struct PatchTire {
    geometry: MeshGeometry,
    spindle: BodyState,
    pub contacts: Vec<MeshContact>,
    pub advances: usize,
}

impl PatchTire {
    pub fn new() -> Self {
        let geometry = MeshGeometry::new(
            vec![
                [0.0, 0.0, -0.1],
                [1.0, 0.0, -0.1],
                [1.0, 1.0, 0.1],
                [0.0, 1.0, 0.1],
            ],
            vec![[0.0, 0.0, 1.0]],
            vec![[0, 1, 2], [0, 2, 3]],
            vec![[0, 0, 0], [0, 0, 0]],
        )
        .expect("patch geometry is valid");
        Self {
            geometry,
            spindle: BodyState::default(),
            contacts: Vec::new(),
            advances: 0,
        }
    }
}

impl TireBackend for PatchTire {
    fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    fn set_spindle_state(&mut self, state: &BodyState) {
        self.spindle = *state;
    }

    fn mesh_state(&self) -> MeshState {
        let vpos = self
            .geometry
            .verts()
            .iter()
            .map(|v| {
                [
                    v[0] + self.spindle.pos[0],
                    v[1] + self.spindle.pos[1],
                    v[2] + self.spindle.pos[2] - 0.5,
                ]
            })
            .collect();
        MeshState {
            vpos,
            vvel: vec![self.spindle.lin_vel; self.geometry.nv()],
        }
    }

    fn apply_contact(&mut self, contact: &MeshContact) {
        self.contacts.push(contact.clone());
    }

    fn spindle_wrench(&self) -> Wrench {
        let mut force = [0.0; 3];
        if let Some(contact) = self.contacts.last() {
            for f in &contact.vforce {
                force[0] += f[0];
                force[1] += f[1];
                force[2] += f[2];
            }
        }
        Wrench {
            force,
            torque: [0.0; 3],
        }
    }

    fn advance(&mut self, _step_size: f64) -> Result<(), BackendError> {
        self.advances += 1;
        Ok(())
    }

    fn output_data(&mut self, _frame: u32, _dir: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}
