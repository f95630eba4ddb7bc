//! Terrain node.
//!
//! The first terrain rank (sub-rank 0, or the sole terrain node) fronts
//! the exchange with the MBS/tire side; additional terrain ranks only
//! coordinate interior partitioning over the terrain sub-communicator,
//! which is outside this protocol. The interface kind and, under MESH,
//! the static tire geometries arrive during the initialize handshake
//! and are fixed for the run.

use crate::comm::Communicator;
use crate::cosim_error::CosimError;
use crate::exchange::data::{BodyState, InterfaceKind, MeshContact, MeshGeometry, MeshState, Wrench};
use crate::exchange::{body, mesh, recv_init_header};
use crate::node::{BackendError, CosimNode, NodeCore};
use crate::topology::{NodeRole, RankRole, TopologyConfig};
use std::path::Path;

/// Terrain contact/deformation backend.
pub trait TerrainBackend {
    /// Register the static geometry for tire `tire` (MESH contract
    /// only), received once during initialize.
    fn register_geometry(
        &mut self,
        tire: usize,
        geometry: &MeshGeometry,
    ) -> Result<(), BackendError>;

    /// Resultant wrench on spindle `tire` for the given state (BODY
    /// contract).
    fn spindle_wrench(&mut self, tire: usize, state: &BodyState) -> Wrench;

    /// Sparse contact forces on the mesh of tire `tire` for the given
    /// vertex state (MESH contract).
    fn mesh_contact(&mut self, tire: usize, state: &MeshState) -> MeshContact;

    /// Integrate the terrain over `step_size` seconds.
    fn advance(&mut self, step_size: f64) -> Result<(), BackendError>;

    /// Write per-frame diagnostics into `dir`.
    fn output_data(&mut self, frame: u32, dir: &Path) -> Result<(), BackendError>;

    fn write_checkpoint(&self, _path: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Negotiated per-run exchange plan, fixed at initialize.
#[derive(Debug)]
struct ExchangePlan {
    kind: InterfaceKind,
    num_tires: usize,
    /// Static geometry per tire; populated only under MESH.
    geometries: Vec<MeshGeometry>,
}

/// A terrain node at one of the terrain ranks.
pub struct TerrainNode<C: Communicator, B: TerrainBackend> {
    core: NodeCore,
    comm: C,
    backend: B,
    plan: Option<ExchangePlan>,
}

impl<C: Communicator, B: TerrainBackend> TerrainNode<C, B> {
    pub fn new(comm: C, config: TopologyConfig, backend: B) -> Result<Self, CosimError> {
        let core = NodeCore::new("TERRAIN", NodeRole::Terrain, comm.rank(), config)?;
        Ok(TerrainNode {
            core,
            comm,
            backend,
            plan: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The interface kind negotiated at initialize, if this rank fronts
    /// the exchange.
    pub fn interface(&self) -> Option<InterfaceKind> {
        self.plan.as_ref().map(|p| p.kind)
    }

    /// Whether this rank performs the MBS/tire exchange (terrain index
    /// 0 by convention).
    fn fronts_exchange(&self) -> bool {
        matches!(self.core.rank_role(), RankRole::Terrain { index: 0 })
    }

    /// Global rank of the node owning the mesh/spindle pairing for tire
    /// `i`: the tire node when tire nodes exist, otherwise the MBS node.
    fn owner_rank(&self, i: usize) -> Result<usize, CosimError> {
        let config = self.core.config();
        if config.num_tire > 0 {
            config.tire_rank(i)
        } else {
            Ok(config.mbs_rank())
        }
    }
}

impl<C: Communicator, B: TerrainBackend> CosimNode for TerrainNode<C, B> {
    fn node_role(&self) -> NodeRole {
        NodeRole::Terrain
    }

    fn core(&self) -> &NodeCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn initialize(&mut self) -> Result<(), CosimError> {
        self.core.begin_initialize()?;
        if !self.fronts_exchange() {
            return Ok(());
        }

        let mbs = self.core.config().mbs_rank();
        let (kind, num_tires) = recv_init_header(&self.comm, mbs)?;

        let mut geometries = Vec::new();
        match kind {
            InterfaceKind::Body => {}
            InterfaceKind::Mesh => {
                if self.core.config().num_tire != num_tires {
                    return Err(CosimError::InvalidTopology(format!(
                        "MESH interface announced {num_tires} tires but {} tire nodes are declared",
                        self.core.config().num_tire
                    )));
                }
                for i in 0..num_tires {
                    let owner = self.owner_rank(i)?;
                    let (tire_kind, geometry) = mesh::recv_geometry(&self.comm, owner, i as u16)?;
                    if tire_kind != kind {
                        return Err(CosimError::InvalidTopology(format!(
                            "tire {i} negotiated {tire_kind:?} but the run uses {kind:?}"
                        )));
                    }
                    self.backend
                        .register_geometry(i, &geometry)
                        .map_err(|source| CosimError::Backend {
                            role: NodeRole::Terrain.as_str(),
                            source,
                        })?;
                    geometries.push(geometry);
                }
            }
        }
        self.plan = Some(ExchangePlan {
            kind,
            num_tires,
            geometries,
        });
        Ok(())
    }

    fn synchronize(&mut self, step_number: u64, time: f64) -> Result<(), CosimError> {
        self.core.begin_synchronize(step_number, time)?;
        if !self.fronts_exchange() {
            // Interior terrain ranks coordinate over the sub-communicator
            // only; nothing crosses the MBS/tire boundary from here.
            return Ok(());
        }
        let (kind, num_tires, vertex_counts) = match &self.plan {
            Some(plan) => (
                plan.kind,
                plan.num_tires,
                plan.geometries.iter().map(|g| g.nv()).collect::<Vec<_>>(),
            ),
            None => {
                return Err(CosimError::ProtocolOrdering {
                    op: "synchronize",
                    phase: "initialized without an exchange plan",
                });
            }
        };

        match kind {
            InterfaceKind::Body => {
                let mbs = self.core.config().mbs_rank();
                let states = body::recv_body_states(&self.comm, mbs, num_tires)?;
                let wrenches: Vec<Wrench> = states
                    .iter()
                    .enumerate()
                    .map(|(i, s)| self.backend.spindle_wrench(i, s))
                    .collect();
                body::send_wrenches(&self.comm, mbs, &wrenches)?;
            }
            InterfaceKind::Mesh => {
                for (i, &nv) in vertex_counts.iter().enumerate().take(num_tires) {
                    let owner = self.owner_rank(i)?;
                    let state = mesh::recv_mesh_state(&self.comm, owner, nv, i as u16)?;
                    let contact = self.backend.mesh_contact(i, &state);
                    mesh::send_mesh_contact(&self.comm, owner, &contact, nv, i as u16)?;
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
                    role: NodeRole::Terrain.as_str(),
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
                    role: NodeRole::Terrain.as_str(),
                    source,
                })?;
        }
        Ok(())
    }
}
