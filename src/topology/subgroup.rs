//! Terrain sub-group membership and sub-rank assignment.
//!
//! When more than one terrain node is declared, the terrain processes
//! form their own communication group so they can coordinate interior
//! partitioning separately from the MBS/tire exchange. Membership and
//! sub-rank are pure functions of the topology and the caller's global
//! rank; the actual communicator split (MPI `split`) lives on the
//! backend and consumes the result computed here.

use crate::cosim_error::CosimError;
use crate::topology::role::{RankRole, TopologyConfig};

/// Sentinel sub-rank for any process outside the terrain sub-group.
pub const NO_SUB_RANK: i32 = -1;

/// Terrain sub-group view for one process, built exactly once during
/// node initialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerrainGroup {
    /// Global ranks of the group members, ascending. Empty when no
    /// sub-group is needed (fewer than two terrain nodes).
    members: Vec<usize>,
    /// This process's rank within the group, or [`NO_SUB_RANK`].
    sub_rank: i32,
}

impl TerrainGroup {
    /// Compute the sub-group view for the process at `rank`.
    ///
    /// A sub-group exists iff more than one terrain node is declared.
    /// Sub-rank order matches ascending global-rank order among the
    /// terrain processes. Every non-terrain process, and the sole
    /// terrain process in a single-terrain run, gets [`NO_SUB_RANK`].
    pub fn build(config: &TopologyConfig, rank: usize) -> Result<Self, CosimError> {
        config.validate()?;
        let role = config.role_of_rank(rank)?;

        if config.num_terrain < 2 {
            return Ok(TerrainGroup {
                members: Vec::new(),
                sub_rank: NO_SUB_RANK,
            });
        }

        let members: Vec<usize> = (0..config.num_terrain)
            .map(|j| config.terrain_rank(j))
            .collect::<Result<_, _>>()?;
        let sub_rank = match role {
            RankRole::Terrain { index } => index as i32,
            _ => NO_SUB_RANK,
        };
        Ok(TerrainGroup { members, sub_rank })
    }

    /// Whether a terrain sub-group exists for this run.
    pub fn exists(&self) -> bool {
        !self.members.is_empty()
    }

    /// Whether the calling process is a member of the sub-group.
    pub fn is_member(&self) -> bool {
        self.sub_rank >= 0
    }

    /// The caller's rank within the terrain sub-group, or `-1` when the
    /// caller is not a member (any non-terrain role, or the sole terrain
    /// node of a single-terrain run).
    pub fn sub_rank(&self) -> i32 {
        self.sub_rank
    }

    /// Global ranks of the sub-group members in sub-rank order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_terrain_has_no_group() {
        let cfg = TopologyConfig::new(1, 2).unwrap();
        for rank in 0..cfg.total_ranks() {
            let g = TerrainGroup::build(&cfg, rank).unwrap();
            assert!(!g.exists());
            assert_eq!(g.sub_rank(), NO_SUB_RANK);
        }
    }

    #[test]
    fn multi_terrain_orders_by_global_rank() {
        let cfg = TopologyConfig::new(3, 1).unwrap();
        // terrain ranks are 1, 2, 3
        for (j, rank) in (1..=3).enumerate() {
            let g = TerrainGroup::build(&cfg, rank).unwrap();
            assert!(g.exists());
            assert_eq!(g.sub_rank(), j as i32);
            assert_eq!(g.members(), &[1, 2, 3]);
        }
        // MBS and tire node stay outside
        for rank in [0usize, 4] {
            let g = TerrainGroup::build(&cfg, rank).unwrap();
            assert!(g.exists());
            assert!(!g.is_member());
            assert_eq!(g.sub_rank(), NO_SUB_RANK);
        }
    }

    #[test]
    fn out_of_range_rank_rejected() {
        let cfg = TopologyConfig::new(2, 0).unwrap();
        assert!(TerrainGroup::build(&cfg, 3).is_err());
    }
}
