//! End-to-end BODY scenario: 1 MBS (rank 0) + 1 TERRAIN (rank 1) +
//! 2 TIRE (ranks 2, 3), every rank on its own thread over the
//! in-process communicator. Each synchronize must move exactly two
//! body-state/wrench pairs between MBS and TERRAIN, and no advance may
//! emit a cross-node message.

mod util;

use cosim_node::comm::LocalComm;
use cosim_node::exchange::InterfaceKind;
use cosim_node::node::{CosimNode, MbsNode, TerrainNode, TireNode};
use cosim_node::topology::TopologyConfig;
use serial_test::serial;
use util::{CountingComm, FlatTerrain, PatchTire, RigVehicle, snapshot};

const STEPS: u64 = 4;
const STEP_SIZE: f64 = 1e-3;

#[test]
#[serial]
fn body_round_moves_two_pairs_per_step_and_advance_is_silent() {
    LocalComm::clear_mailbox();
    let cfg = TopologyConfig::new(1, 2).unwrap();

    let mbs = std::thread::spawn(move || {
        let comm = CountingComm::new(LocalComm::new(0, 4));
        let (sends, recvs) = comm.counters();
        let mut node =
            MbsNode::new(comm, cfg, RigVehicle::new(2), InterfaceKind::Body).unwrap();
        node.core_mut().set_verbose(false);
        node.initialize().unwrap();

        let mut step_time_sum = 0.0;
        for step in 0..STEPS {
            let before = snapshot(&sends, &recvs);
            node.synchronize(step, step as f64 * STEP_SIZE).unwrap();
            let after = snapshot(&sends, &recvs);
            // exactly one state out and one wrench in per tire
            assert_eq!(after.0 - before.0, 2, "MBS sends per synchronize");
            assert_eq!(after.1 - before.1, 2, "MBS receives per synchronize");

            let before = snapshot(&sends, &recvs);
            node.advance(STEP_SIZE).unwrap();
            let after = snapshot(&sends, &recvs);
            assert_eq!(before, after, "advance must not communicate");
            step_time_sum += node.step_execution_time();
        }

        // every tire got the terrain's wrench, every step
        for tire in 0..2 {
            let applied = &node.backend().applied[tire];
            assert_eq!(applied.len(), STEPS as usize);
            for w in applied {
                assert_eq!(*w, FlatTerrain::expected_wrench(tire));
            }
        }
        // cumulative time is the sum of the individual step times
        assert!((step_time_sum - node.total_execution_time()).abs() < 1e-9);
    });

    let terrain = std::thread::spawn(move || {
        let comm = CountingComm::new(LocalComm::new(1, 4));
        let (sends, recvs) = comm.counters();
        let mut node = TerrainNode::new(comm, cfg, FlatTerrain::new()).unwrap();
        node.core_mut().set_verbose(false);
        node.initialize().unwrap();
        assert_eq!(node.interface(), Some(InterfaceKind::Body));

        for step in 0..STEPS {
            let before = snapshot(&sends, &recvs);
            node.synchronize(step, step as f64 * STEP_SIZE).unwrap();
            let after = snapshot(&sends, &recvs);
            assert_eq!(after.0 - before.0, 2, "terrain sends per synchronize");
            assert_eq!(after.1 - before.1, 2, "terrain receives per synchronize");

            let before = snapshot(&sends, &recvs);
            node.advance(STEP_SIZE).unwrap();
            assert_eq!(before, snapshot(&sends, &recvs));
        }
        assert_eq!(node.backend().body_rounds, 2 * STEPS as usize);
        // BODY rounds never touch mesh data
        assert!(node.backend().geometries.is_empty());
    });

    let tires: Vec<_> = (0..2usize)
        .map(|i| {
            std::thread::spawn(move || {
                let comm = CountingComm::new(LocalComm::new(2 + i, 4));
                let (sends, recvs) = comm.counters();
                let mut node =
                    TireNode::new(comm, cfg, PatchTire::new(), InterfaceKind::Body).unwrap();
                node.core_mut().set_verbose(false);
                node.initialize().unwrap();

                for step in 0..STEPS {
                    node.synchronize(step, step as f64 * STEP_SIZE).unwrap();
                    node.advance(STEP_SIZE).unwrap();
                }
                // under BODY a tire node never crosses the node boundary
                assert_eq!(snapshot(&sends, &recvs), (0, 0));
                assert_eq!(node.backend().advances, STEPS as usize);
            })
        })
        .collect();

    mbs.join().unwrap();
    terrain.join().unwrap();
    for t in tires {
        t.join().unwrap();
    }
}
