//! Co-simulation node lifecycle and role implementations.
//!
//! Every node follows the same lifecycle: `initialize` exactly once,
//! then repeated `synchronize` / `advance` pairs driven in lockstep by
//! the external driver, with `output_data` / `write_checkpoint` allowed
//! after any advance. All cross-node communication happens inside
//! `synchronize`; `advance` is purely local integration and must never
//! touch the communicator.
//!
//! The physics itself is an external collaborator behind the per-role
//! backend traits ([`mbs::MbsBackend`], [`terrain::TerrainBackend`],
//! [`tire::TireBackend`]); this layer owns only ordering, topology, and
//! the data contract.

pub mod mbs;
pub mod terrain;
pub mod tire;

use crate::cosim_error::CosimError;
use crate::output::OutputLayout;
use crate::timing::NodeTimers;
use crate::topology::{NodeRole, RankRole, TerrainGroup, TopologyConfig};

pub use mbs::{MbsBackend, MbsNode};
pub use terrain::{TerrainBackend, TerrainNode};
pub use tire::{TireBackend, TireNode};

/// Boxed error surfaced by a physics backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Default integration step size in seconds.
pub const DEFAULT_STEP_SIZE: f64 = 1e-4;

/// Default gravitational acceleration (absolute frame, z up).
pub const DEFAULT_GRAVITY: [f64; 3] = [0.0, 0.0, -9.81];

/// Uniform capability interface over the node roles.
///
/// `synchronize`, `advance`, and `output_data` are required overrides;
/// a role that does not implement them cannot be instantiated.
/// `write_checkpoint` defaults to a no-op, like the base class it
/// replaces.
pub trait CosimNode {
    fn node_role(&self) -> NodeRole;

    fn core(&self) -> &NodeCore;
    fn core_mut(&mut self) -> &mut NodeCore;

    /// One-time setup, including any initial data exchange with other
    /// nodes (e.g. the mesh geometry handshake).
    fn initialize(&mut self) -> Result<(), CosimError>;

    /// Per-step cross-node exchange at a synchronization time.
    fn synchronize(&mut self, step_number: u64, time: f64) -> Result<(), CosimError>;

    /// Purely local integration over `step_size` seconds. Internal
    /// sub-stepping is up to the backend; no inter-node communication
    /// may occur here.
    fn advance(&mut self, step_size: f64) -> Result<(), CosimError>;

    /// Output logging and debugging data for `frame`.
    fn output_data(&mut self, frame: u32) -> Result<(), CosimError>;

    /// Write a checkpoint into the node's output directory.
    fn write_checkpoint(&self, _filename: &str) -> Result<(), CosimError> {
        Ok(())
    }

    /// Wall time of the most recently completed advance, in seconds.
    fn step_execution_time(&self) -> f64 {
        self.core().timers().step_time()
    }

    /// Cumulative advance wall time since initialize, in seconds.
    fn total_execution_time(&self) -> f64 {
        self.core().timers().total_time()
    }
}

/// Lifecycle phase of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initialized,
    Synchronized,
    Advanced,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::Synchronized => "synchronized",
            Phase::Advanced => "advanced",
        }
    }
}

/// Per-node state shared by all roles: lifecycle phase, configuration
/// surface, timers, and output layout. Owned by exactly one node
/// instance; never shared across processes.
#[derive(Debug)]
pub struct NodeCore {
    name: String,
    role: NodeRole,
    rank: usize,
    config: TopologyConfig,
    terrain_group: Option<TerrainGroup>,
    step_size: f64,
    gacc: [f64; 3],
    verbose: bool,
    layout: Option<OutputLayout>,
    timers: NodeTimers,
    phase: Phase,
}

impl NodeCore {
    /// Build the core for a node of `role` at global `rank`.
    ///
    /// Fails if the topology is invalid or the rank does not resolve to
    /// the declared role under the fixed rank convention.
    pub fn new(
        name: impl Into<String>,
        role: NodeRole,
        rank: usize,
        config: TopologyConfig,
    ) -> Result<Self, CosimError> {
        config.validate()?;
        let resolved = config.role_of_rank(rank)?;
        if resolved.role() != role {
            return Err(CosimError::InvalidTopology(format!(
                "rank {rank} resolves to {} but a {} node was requested",
                resolved.role(),
                role
            )));
        }
        Ok(NodeCore {
            name: name.into(),
            role,
            rank,
            config,
            terrain_group: None,
            step_size: DEFAULT_STEP_SIZE,
            gacc: DEFAULT_GRAVITY,
            verbose: true,
            layout: None,
            timers: NodeTimers::new(),
            phase: Phase::Uninitialized,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn role(&self) -> NodeRole {
        self.role
    }
    pub fn rank(&self) -> usize {
        self.rank
    }
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// This rank's resolved role, including its index within the role
    /// group.
    pub fn rank_role(&self) -> RankRole {
        self.config
            .role_of_rank(self.rank)
            .expect("rank validated in NodeCore::new")
    }

    /// Set the integration step size (default 1e-4).
    pub fn set_step_size(&mut self, step: f64) {
        self.step_size = step;
    }
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Set the gravitational acceleration handed to the physics
    /// backends (default [`DEFAULT_GRAVITY`], z up).
    pub fn set_gravity(&mut self, gacc: [f64; 3]) {
        self.gacc = gacc;
    }
    pub fn gravity(&self) -> [f64; 3] {
        self.gacc
    }

    /// Enable/disable verbose messages during simulation (default on).
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Create the node output directory `{dir}/{RoleName}{suffix}/`.
    pub fn set_out_dir(&mut self, dir: impl AsRef<std::path::Path>, suffix: &str) -> Result<(), CosimError> {
        self.layout = Some(OutputLayout::create(dir, self.role, suffix)?);
        Ok(())
    }

    /// The node output directory, if configured.
    pub fn out_dir(&self) -> Option<&OutputLayout> {
        self.layout.as_ref()
    }

    pub fn timers(&self) -> &NodeTimers {
        &self.timers
    }

    /// Terrain sub-group view; available after initialize.
    pub fn terrain_group(&self) -> Option<&TerrainGroup> {
        self.terrain_group.as_ref()
    }

    /// Rank within the terrain sub-communicator, `-1` when not a
    /// member (any non-terrain role, single-terrain runs, or before
    /// initialize).
    pub fn sub_rank(&self) -> i32 {
        self.terrain_group
            .as_ref()
            .map_or(crate::topology::NO_SUB_RANK, |g| g.sub_rank())
    }

    fn ordering_violation(&self, op: &'static str) -> CosimError {
        CosimError::ProtocolOrdering {
            op,
            phase: self.phase.name(),
        }
    }

    /// Transition into the initialized phase, building the terrain
    /// sub-group view exactly once.
    pub fn begin_initialize(&mut self) -> Result<(), CosimError> {
        if self.phase != Phase::Uninitialized {
            return Err(self.ordering_violation("initialize"));
        }
        self.terrain_group = Some(TerrainGroup::build(&self.config, self.rank)?);
        self.phase = Phase::Initialized;
        if self.verbose {
            log::info!(
                "[{}] {} node initialized at rank {} (sub-rank {})",
                self.name,
                self.role,
                self.rank,
                self.sub_rank()
            );
        }
        Ok(())
    }

    /// Guard a synchronize call: legal from the initialized phase or
    /// right after an advance.
    pub fn begin_synchronize(&mut self, step_number: u64, time: f64) -> Result<(), CosimError> {
        match self.phase {
            Phase::Initialized | Phase::Advanced => {
                self.phase = Phase::Synchronized;
                if self.verbose {
                    log::debug!(
                        "[{}] synchronize step {step_number} at t = {time:.6}",
                        self.name
                    );
                }
                Ok(())
            }
            _ => Err(self.ordering_violation("synchronize")),
        }
    }

    /// Guard an advance call and start the step timer. Legal only after
    /// a matching synchronize.
    pub fn begin_advance(&mut self) -> Result<(), CosimError> {
        if self.phase != Phase::Synchronized {
            return Err(self.ordering_violation("advance"));
        }
        self.timers.start_step();
        Ok(())
    }

    /// Stop the step timer and mark the advance complete.
    pub fn end_advance(&mut self) {
        self.timers.stop_step();
        self.phase = Phase::Advanced;
        if self.verbose {
            log::debug!(
                "[{}] advance done in {:.3e} s (total {:.3e} s)",
                self.name,
                self.timers.step_time(),
                self.timers.total_time()
            );
        }
    }

    /// Guard an output or checkpoint call: anything goes once the node
    /// is initialized; the phase is left untouched.
    pub fn check_output_allowed(&self, op: &'static str) -> Result<(), CosimError> {
        if self.phase == Phase::Uninitialized {
            return Err(self.ordering_violation(op));
        }
        Ok(())
    }

    /// Wrap a backend advance: ordering guard, step timing, and fatal
    /// surfacing of backend failure.
    pub fn advance_with<F>(&mut self, f: F) -> Result<(), CosimError>
    where
        F: FnOnce() -> Result<(), BackendError>,
    {
        self.begin_advance()?;
        let result = f();
        self.end_advance();
        result.map_err(|source| CosimError::Backend {
            role: self.role.as_str(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> NodeCore {
        let cfg = TopologyConfig::new(1, 0).unwrap();
        NodeCore::new("mbs", NodeRole::Mbs, 0, cfg).unwrap()
    }

    #[test]
    fn advance_before_initialize_rejected() {
        let mut c = core();
        assert!(matches!(
            c.begin_advance(),
            Err(CosimError::ProtocolOrdering { op: "advance", .. })
        ));
    }

    #[test]
    fn advance_before_first_synchronize_rejected() {
        let mut c = core();
        c.begin_initialize().unwrap();
        assert!(matches!(
            c.begin_advance(),
            Err(CosimError::ProtocolOrdering { op: "advance", .. })
        ));
    }

    #[test]
    fn double_initialize_rejected() {
        let mut c = core();
        c.begin_initialize().unwrap();
        assert!(c.begin_initialize().is_err());
    }

    #[test]
    fn synchronize_advance_alternation() {
        let mut c = core();
        c.set_verbose(false);
        c.begin_initialize().unwrap();
        for step in 0..3u64 {
            c.begin_synchronize(step, step as f64 * 1e-3).unwrap();
            c.begin_advance().unwrap();
            c.end_advance();
        }
        // a second advance without a new synchronize is an ordering bug
        assert!(c.begin_advance().is_err());
    }

    #[test]
    fn rank_role_resolves_per_convention() {
        let cfg = TopologyConfig::new(2, 1).unwrap();
        let c = NodeCore::new("tire", NodeRole::Tire, 3, cfg).unwrap();
        assert_eq!(c.rank_role(), RankRole::Tire { index: 0 });
    }

    #[test]
    fn gravity_defaults_and_overrides() {
        let mut c = core();
        assert_eq!(c.gravity(), DEFAULT_GRAVITY);
        c.set_gravity([0.0, 0.0, -1.62]);
        assert_eq!(c.gravity(), [0.0, 0.0, -1.62]);
    }

    #[test]
    fn role_rank_mismatch_rejected() {
        let cfg = TopologyConfig::new(1, 1).unwrap();
        assert!(NodeCore::new("x", NodeRole::Tire, 1, cfg).is_err());
    }

    #[test]
    fn backend_failure_is_fatal() {
        let mut c = core();
        c.set_verbose(false);
        c.begin_initialize().unwrap();
        c.begin_synchronize(0, 0.0).unwrap();
        let err = c.advance_with(|| Err("diverged".into()));
        assert!(matches!(err, Err(CosimError::Backend { role: "MBS", .. })));
    }
}
