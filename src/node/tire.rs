//! Tire node.
//!
//! Under the MESH contract a tire node owns its mesh-level coupling: it
//! receives the spindle state from the MBS node, trades its full vertex
//! state for sparse contact forces with the terrain side, and reports
//! the resultant spindle wrench back to the MBS node, all within one
//! synchronize. Under the BODY contract the spindle pairs go straight
//! between the MBS and terrain nodes; a tire node then advances its own
//! model without any cross-node exchange.

use crate::comm::Communicator;
use crate::cosim_error::CosimError;
use crate::exchange::data::{BodyState, InterfaceKind, MeshContact, MeshGeometry, MeshState, Wrench};
use crate::exchange::{body, mesh};
use crate::node::{BackendError, CosimNode, NodeCore};
use crate::topology::{NodeRole, RankRole, TopologyConfig};
use std::path::Path;

/// Flexible-tire backend living behind a tire node.
pub trait TireBackend {
    /// Static mesh of the tire in its reference configuration.
    fn geometry(&self) -> &MeshGeometry;

    /// Spindle state received from the MBS node at a synchronization
    /// point; the tire model constrains its rim to it.
    fn set_spindle_state(&mut self, state: &BodyState);

    /// Current per-vertex state in the absolute frame.
    fn mesh_state(&self) -> MeshState;

    /// Apply the terrain contact forces, effective for the next advance.
    fn apply_contact(&mut self, contact: &MeshContact);

    /// Resultant wrench transmitted through the spindle, reported back
    /// to the MBS node.
    fn spindle_wrench(&self) -> Wrench;

    /// Integrate the tire over `step_size` seconds.
    fn advance(&mut self, step_size: f64) -> Result<(), BackendError>;

    /// Write per-frame diagnostics into `dir`.
    fn output_data(&mut self, frame: u32, dir: &Path) -> Result<(), BackendError>;

    fn write_checkpoint(&self, _path: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}

/// A tire node at rank `tire_rank(i)`.
pub struct TireNode<C: Communicator, B: TireBackend> {
    core: NodeCore,
    comm: C,
    backend: B,
    tire_index: usize,
    interface: InterfaceKind,
}

impl<C: Communicator, B: TireBackend> TireNode<C, B> {
    pub fn new(
        comm: C,
        config: TopologyConfig,
        backend: B,
        interface: InterfaceKind,
    ) -> Result<Self, CosimError> {
        let core = NodeCore::new("TIRE", NodeRole::Tire, comm.rank(), config)?;
        let tire_index = match core.rank_role() {
            RankRole::Tire { index } => index,
            // NodeCore::new already checked the role.
            _ => unreachable!("tire node constructed at a non-tire rank"),
        };
        Ok(TireNode {
            core,
            comm,
            backend,
            tire_index,
            interface,
        })
    }

    /// The interface kind this run was configured with.
    pub fn interface(&self) -> InterfaceKind {
        self.interface
    }

    /// Index of this tire within the run (0-based).
    pub fn tire_index(&self) -> usize {
        self.tire_index
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn terrain_peer(&self) -> Result<usize, CosimError> {
        self.core.config().terrain_rank(0)
    }
}

impl<C: Communicator, B: TireBackend> CosimNode for TireNode<C, B> {
    fn node_role(&self) -> NodeRole {
        NodeRole::Tire
    }

    fn core(&self) -> &NodeCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn initialize(&mut self) -> Result<(), CosimError> {
        self.core.begin_initialize()?;
        if self.interface == InterfaceKind::Body {
            return Ok(());
        }
        // Push the static geometry to the terrain side once; it fixes
        // the MESH contract for this pairing.
        let terrain = self.terrain_peer()?;
        mesh::send_geometry(
            &self.comm,
            terrain,
            InterfaceKind::Mesh,
            self.backend.geometry(),
            self.tire_index as u16,
        )
    }

    fn synchronize(&mut self, step_number: u64, time: f64) -> Result<(), CosimError> {
        self.core.begin_synchronize(step_number, time)?;
        if self.interface == InterfaceKind::Body {
            // Spindle pairs travel MBS <-> terrain directly in this mode.
            return Ok(());
        }
        let mbs = self.core.config().mbs_rank();
        let terrain = self.terrain_peer()?;
        let lane = self.tire_index as u16;

        // Spindle state from the vehicle.
        let spindle = body::recv_body_states(&self.comm, mbs, 1)?;
        self.backend.set_spindle_state(&spindle[0]);

        // Vertex state out, contact forces back.
        let state = self.backend.mesh_state();
        let nv = self.backend.geometry().nv();
        let contact = mesh::exchange_state_for_contact(&self.comm, terrain, &state, nv, lane)?;
        self.backend.apply_contact(&contact);

        // Resultant spindle wrench back to the vehicle.
        let wrench = self.backend.spindle_wrench();
        body::send_wrenches(&self.comm, mbs, std::slice::from_ref(&wrench))
    }

    fn advance(&mut self, step_size: f64) -> Result<(), CosimError> {
        let backend = &mut self.backend;
        self.core.advance_with(|| backend.advance(step_size))
    }

    fn output_data(&mut self, frame: u32) -> Result<(), CosimError> {
        self.core.check_output_allowed("output_data")?;
        if let Some(layout) = self.core.out_dir() {
            let dir = layout.node_dir().to_path_buf();
            self.backend
                .output_data(frame, &dir)
                .map_err(|source| CosimError::Backend {
                    role: NodeRole::Tire.as_str(),
                    source,
                })?;
        }
        Ok(())
    }

    fn write_checkpoint(&self, filename: &str) -> Result<(), CosimError> {
        self.core.check_output_allowed("write_checkpoint")?;
        if let Some(layout) = self.core.out_dir() {
            let path = layout.resolve(filename);
            self.backend
                .write_checkpoint(&path)
                .map_err(|source| CosimError::Backend {
                    role: NodeRole::Tire.as_str(),
                    source,
                })?;
        }
        Ok(())
    }
}
