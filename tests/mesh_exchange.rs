//! End-to-end MESH scenario: 1 MBS + 1 TERRAIN + 1 TIRE. The tire node
//! owns the mesh-level coupling: geometry crosses the wire once at
//! initialize, then every synchronize trades the full vertex state for
//! a sparse contact list whose indices stay inside the negotiated
//! vertex range.

mod util;

use cosim_node::comm::LocalComm;
use cosim_node::exchange::InterfaceKind;
use cosim_node::node::{CosimNode, MbsNode, TerrainNode, TireBackend, TireNode};
use cosim_node::topology::TopologyConfig;
use serial_test::serial;
use util::{FlatTerrain, PatchTire, RigVehicle};

const STEPS: u64 = 3;
const STEP_SIZE: f64 = 1e-3;

#[test]
#[serial]
fn mesh_round_trades_state_for_sparse_contact() {
    LocalComm::clear_mailbox();
    let cfg = TopologyConfig::new(1, 1).unwrap();

    let mbs = std::thread::spawn(move || {
        let comm = LocalComm::new(0, 3);
        let mut node =
            MbsNode::new(comm, cfg, RigVehicle::new(1), InterfaceKind::Mesh).unwrap();
        node.core_mut().set_verbose(false);
        node.initialize().unwrap();
        for step in 0..STEPS {
            node.synchronize(step, step as f64 * STEP_SIZE).unwrap();
            node.advance(STEP_SIZE).unwrap();
        }
        // the tire reported a resultant wrench each step
        assert_eq!(node.backend().applied[0].len(), STEPS as usize);
        for w in &node.backend().applied[0] {
            assert!(w.force[2] > 0.0, "contact pushes the spindle up");
        }
    });

    let terrain = std::thread::spawn(move || {
        let comm = LocalComm::new(1, 3);
        let mut node = TerrainNode::new(comm, cfg, FlatTerrain::new()).unwrap();
        node.core_mut().set_verbose(false);
        node.initialize().unwrap();
        assert_eq!(node.interface(), Some(InterfaceKind::Mesh));
        // geometry arrived once, during initialize, and matches the
        // tire patch
        assert_eq!(node.backend().geometries.len(), 1);
        let geom = &node.backend().geometries[0];
        assert_eq!((geom.nv(), geom.nn(), geom.nt()), (4, 1, 2));

        for step in 0..STEPS {
            node.synchronize(step, step as f64 * STEP_SIZE).unwrap();
            node.advance(STEP_SIZE).unwrap();
        }
    });

    let tire = std::thread::spawn(move || {
        let comm = LocalComm::new(2, 3);
        let mut node = TireNode::new(comm, cfg, PatchTire::new(), InterfaceKind::Mesh).unwrap();
        node.core_mut().set_verbose(false);
        node.initialize().unwrap();
        for step in 0..STEPS {
            node.synchronize(step, step as f64 * STEP_SIZE).unwrap();
            node.advance(STEP_SIZE).unwrap();
        }

        let nv = node.backend().geometry().nv();
        assert_eq!(node.backend().contacts.len(), STEPS as usize);
        for contact in &node.backend().contacts {
            // contact indices are a subset of the vertex range and the
            // list stays sparse
            assert!(contact.len() <= nv);
            assert!(contact.vidx.iter().all(|&i| (i as usize) < nv));
            // the patch keeps its leading edge below ground, so the
            // flat terrain always touches something
            assert!(!contact.is_empty());
        }
    });

    mbs.join().unwrap();
    terrain.join().unwrap();
    tire.join().unwrap();
}
