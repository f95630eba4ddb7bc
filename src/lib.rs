//! # cosim-node
//!
//! cosim-node is the synchronization layer for distributed vehicle–terrain
//! co-simulation: it defines node roles, communication topology, the node
//! lifecycle, and the BODY/MESH data-exchange contract that let
//! independently-implemented physics modules cooperate across process
//! boundaries. The physics itself (multibody integration, terrain
//! deformation, flexible-tire dynamics) stays behind backend traits.
//!
//! ## Model
//! One process per node, assigned a role by its global rank: rank 0 is
//! the MBS (vehicle) node, rank 1 the first terrain node, and tire nodes
//! follow. The driver runs all nodes in lockstep: `initialize` once,
//! then repeated `synchronize(step, time)` / `advance(step_size)` pairs.
//! All cross-node communication happens inside `synchronize`; `advance`
//! is purely local. A transport failure or ordering violation is fatal
//! for the run.
//!
//! ## Features
//! - `mpi-support`: real MPI backend via the `mpi` crate. The default
//!   build is pure Rust; multi-node protocol rounds are exercised with
//!   the in-process [`comm::LocalComm`] backend.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! cosim-node = "0.1"
//! # features = ["mpi-support"]
//! ```

pub mod comm;
pub mod cosim_error;
pub mod exchange;
pub mod node;
pub mod output;
pub mod timing;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, LocalComm, NoComm, Wait};
    pub use crate::cosim_error::CosimError;
    pub use crate::exchange::{
        BodyState, InterfaceKind, MeshContact, MeshGeometry, MeshState, Wrench,
    };
    pub use crate::node::{
        CosimNode, MbsBackend, MbsNode, NodeCore, TerrainBackend, TerrainNode, TireBackend,
        TireNode,
    };
    pub use crate::output::{OutputLayout, output_filename};
    pub use crate::timing::NodeTimers;
    pub use crate::topology::{NO_SUB_RANK, NodeRole, RankRole, TerrainGroup, TopologyConfig};
}
