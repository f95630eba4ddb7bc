//! Multibody-system (vehicle) node.
//!
//! Rank 0 of every run. Under the BODY contract it exchanges one
//! spindle state / wrench pair per tire with the terrain side; under
//! the MESH contract the spindle pairs go to the tire nodes, which own
//! the mesh-level coupling with the terrain.

use crate::comm::Communicator;
use crate::cosim_error::CosimError;
use crate::exchange::data::{BodyState, InterfaceKind, Wrench};
use crate::exchange::{body, send_init_header};
use crate::node::{BackendError, CosimNode, NodeCore};
use crate::topology::{NodeRole, TopologyConfig};
use std::path::Path;

/// Multibody dynamics backend: the vehicle model behind the MBS node.
pub trait MbsBackend {
    /// Number of tires (wheel spindles) on the vehicle.
    fn num_tires(&self) -> usize;

    /// Current state of spindle `tire` in the absolute frame.
    fn spindle_state(&self, tire: usize) -> BodyState;

    /// Apply the terrain/tire reaction wrench to spindle `tire`,
    /// effective for the next advance.
    fn apply_spindle_wrench(&mut self, tire: usize, wrench: Wrench);

    /// Integrate the vehicle over `step_size` seconds; internal
    /// sub-stepping is allowed.
    fn advance(&mut self, step_size: f64) -> Result<(), BackendError>;

    /// Write per-frame diagnostics into `dir`.
    fn output_data(&mut self, frame: u32, dir: &Path) -> Result<(), BackendError>;

    /// Write an opaque checkpoint to `path`; the format is owned by the
    /// backend.
    fn write_checkpoint(&self, _path: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}

/// The MBS node: rank 0, exactly one per run.
pub struct MbsNode<C: Communicator, B: MbsBackend> {
    core: NodeCore,
    comm: C,
    backend: B,
    interface: InterfaceKind,
}

impl<C: Communicator, B: MbsBackend> MbsNode<C, B> {
    /// Build an MBS node with the negotiated interface kind.
    ///
    /// Under the MESH contract the mesh owners are the tire nodes, so
    /// the declared tire-node count must match the vehicle's tire
    /// count; any other combination is a configuration error.
    pub fn new(
        comm: C,
        config: TopologyConfig,
        backend: B,
        interface: InterfaceKind,
    ) -> Result<Self, CosimError> {
        let core = NodeCore::new("MBS", NodeRole::Mbs, comm.rank(), config)?;
        match interface {
            InterfaceKind::Mesh => {
                if config.num_tire != backend.num_tires() {
                    return Err(CosimError::InvalidTopology(format!(
                        "MESH interface requires one tire node per tire: \
                         {} tire nodes declared for {} tires",
                        config.num_tire,
                        backend.num_tires()
                    )));
                }
            }
            InterfaceKind::Body => {}
        }
        Ok(MbsNode {
            core,
            comm,
            backend,
            interface,
        })
    }

    pub fn interface(&self) -> InterfaceKind {
        self.interface
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn collect_states(&self) -> Vec<BodyState> {
        (0..self.backend.num_tires())
            .map(|i| self.backend.spindle_state(i))
            .collect()
    }
}

impl<C: Communicator, B: MbsBackend> CosimNode for MbsNode<C, B> {
    fn node_role(&self) -> NodeRole {
        NodeRole::Mbs
    }

    fn core(&self) -> &NodeCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn initialize(&mut self) -> Result<(), CosimError> {
        self.core.begin_initialize()?;
        let terrain = self.core.config().terrain_rank(0)?;
        send_init_header(
            &self.comm,
            terrain,
            self.interface,
            self.backend.num_tires(),
        )?;
        Ok(())
    }

    fn synchronize(&mut self, step_number: u64, time: f64) -> Result<(), CosimError> {
        self.core.begin_synchronize(step_number, time)?;
        let states = self.collect_states();
        match self.interface {
            InterfaceKind::Body => {
                // All spindle pairs go straight to the terrain side.
                let terrain = self.core.config().terrain_rank(0)?;
                let wrenches = body::exchange_states_for_wrenches(&self.comm, terrain, &states)?;
                for (i, w) in wrenches.into_iter().enumerate() {
                    self.backend.apply_spindle_wrench(i, w);
                }
            }
            InterfaceKind::Mesh => {
                // One spindle pair per tire node; the tire nodes handle
                // the mesh-level coupling with the terrain.
                for (i, state) in states.iter().enumerate() {
                    let tire = self.core.config().tire_rank(i)?;
                    let wrenches = body::exchange_states_for_wrenches(
                        &self.comm,
                        tire,
                        std::slice::from_ref(state),
                    )?;
                    self.backend.apply_spindle_wrench(i, wrenches[0]);
                }
            }
        }
        Ok(())
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
                    role: NodeRole::Mbs.as_str(),
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
                    role: NodeRole::Mbs.as_str(),
                    source,
                })?;
        }
        Ok(())
    }
}
