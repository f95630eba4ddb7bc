//! Process topology for a co-simulation run.
//!
//! This module provides the role and rank conventions plus the terrain
//! sub-group machinery:
//! - [`role::NodeRole`] and [`role::TopologyConfig`] for the fixed
//!   rank-to-role mapping
//! - [`subgroup::TerrainGroup`] for terrain-only sub-communicator
//!   membership and sub-rank assignment

pub mod role;
pub mod subgroup;

pub use role::{NodeRole, RankRole, TopologyConfig};
pub use subgroup::{NO_SUB_RANK, TerrainGroup};
