//! Node roles and the fixed rank-to-role convention.
//!
//! Every process in a co-simulation carries exactly one role. The layout
//! over global ranks is fixed so any node can compute the rank of any
//! peer without a discovery handshake:
//!
//! - rank 0 is always the MBS node,
//! - ranks `1..=num_terrain` are the terrain nodes (rank 1 first),
//! - tire node `i` sits at rank `num_terrain + 1 + i`.
//!
//! With a single terrain node this reproduces the classic layout
//! `MBS = 0`, `TERRAIN = 1`, `TIRE(i) = i + 2`.

use crate::cosim_error::CosimError;
use std::fmt;

/// Type of node participating in co-simulation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeRole {
    /// Node performing multibody dynamics (vehicle).
    Mbs,
    /// Node performing terrain simulation.
    Terrain,
    /// Node performing tire simulation (if outside MBS).
    Tire,
}

impl NodeRole {
    /// Role name as used in output directory naming.
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeRole::Mbs => "MBS",
            NodeRole::Terrain => "TERRAIN",
            NodeRole::Tire => "TIRE",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved role for a concrete global rank.
///
/// Terrain and tire roles carry their index within their role group
/// (0-based, in ascending global-rank order).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RankRole {
    Mbs,
    Terrain { index: usize },
    Tire { index: usize },
}

impl RankRole {
    pub const fn role(self) -> NodeRole {
        match self {
            RankRole::Mbs => NodeRole::Mbs,
            RankRole::Terrain { .. } => NodeRole::Terrain,
            RankRole::Tire { .. } => NodeRole::Tire,
        }
    }
}

/// Declared node counts for one co-simulation run.
///
/// Computed once at startup and passed to every component; no rank
/// arithmetic lives anywhere else.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TopologyConfig {
    /// Number of MBS nodes; must be exactly 1.
    pub num_mbs: usize,
    /// Number of terrain nodes; must be at least 1.
    pub num_terrain: usize,
    /// Number of tire nodes; may be 0.
    pub num_tire: usize,
}

impl TopologyConfig {
    /// Build a validated topology with one MBS node and the given
    /// terrain/tire counts.
    pub fn new(num_terrain: usize, num_tire: usize) -> Result<Self, CosimError> {
        let cfg = TopologyConfig {
            num_mbs: 1,
            num_terrain,
            num_tire,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the declared counts: exactly one MBS, at least one terrain.
    pub fn validate(&self) -> Result<(), CosimError> {
        if self.num_mbs != 1 {
            return Err(CosimError::InvalidTopology(format!(
                "expected exactly 1 MBS node, got {}",
                self.num_mbs
            )));
        }
        if self.num_terrain == 0 {
            return Err(CosimError::InvalidTopology(
                "at least one terrain node is required".into(),
            ));
        }
        Ok(())
    }

    /// Total number of ranks in the run.
    pub fn total_ranks(&self) -> usize {
        self.num_mbs + self.num_terrain + self.num_tire
    }

    /// Global rank of the MBS node.
    pub const fn mbs_rank(&self) -> usize {
        0
    }

    /// Global rank of terrain node `j`.
    pub fn terrain_rank(&self, j: usize) -> Result<usize, CosimError> {
        if j >= self.num_terrain {
            return Err(CosimError::InvalidTopology(format!(
                "terrain index {j} out of range (num_terrain = {})",
                self.num_terrain
            )));
        }
        Ok(1 + j)
    }

    /// Global rank of tire node `i`.
    pub fn tire_rank(&self, i: usize) -> Result<usize, CosimError> {
        if i >= self.num_tire {
            return Err(CosimError::InvalidTopology(format!(
                "tire index {i} out of range (num_tire = {})",
                self.num_tire
            )));
        }
        Ok(self.num_terrain + 1 + i)
    }

    /// Resolve a global rank to its role.
    ///
    /// Pure and deterministic; a bijection over `0..total_ranks()`.
    pub fn role_of_rank(&self, rank: usize) -> Result<RankRole, CosimError> {
        let total = self.total_ranks();
        if rank >= total {
            return Err(CosimError::RankOutOfRange { rank, total });
        }
        if rank == 0 {
            Ok(RankRole::Mbs)
        } else if rank <= self.num_terrain {
            Ok(RankRole::Terrain { index: rank - 1 })
        } else {
            Ok(RankRole::Tire {
                index: rank - self.num_terrain - 1,
            })
        }
    }
}
