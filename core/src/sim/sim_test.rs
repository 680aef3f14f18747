use std::sync::Arc;

use super::energy::{EnergyDistribution, GeyserConfig, GeyserDistribution, Lcg};
use super::*;
use crate::compiler::{self, CompileOptions};
use crate::config::SimulationConfig;
use crate::emit::ProgramArtifact;
use crate::organism::{ConflictStatus, Value};
use crate::world::Molecule;

fn cfg(shape: Vec<i64>) -> SimulationConfig {
    SimulationConfig {
        shape,
        toroidal: true,
        ..SimulationConfig::default()
    }
}

fn compile(source: &str, shape: &[i64]) -> Arc<ProgramArtifact> {
    let opts = CompileOptions::new(shape.to_vec(), true);
    Arc::new(compiler::compile_source(source, "test.evo", &opts).expect("compiles"))
}

/// Compile and place one program at the origin with the artifact (and its
/// call-site bindings) registered.
fn sim_with_program(source: &str, shape: Vec<i64>, energy: i64) -> (Simulation, u32) {
    let artifact = compile(source, &shape);
    let mut sim = Simulation::new(cfg(shape));
    sim.register_artifact(artifact.clone());
    let id = sim.place_program(artifact.program_id, &[0, 0], energy).unwrap();
    (sim, id)
}

/// Compile and load the machine code only: no artifact table, no call-site
/// bindings. Calls must work through the PUSH/POP sequences alone.
fn sim_code_only(source: &str, shape: Vec<i64>, energy: i64) -> (Simulation, u32) {
    let artifact = compile(source, &shape);
    let mut sim = Simulation::new(cfg(shape));
    for (coord, word) in &artifact.machine_code_layout {
        sim.env.set(coord, Molecule::from_word(*word));
    }
    let id = sim.spawn_organism(artifact.program_id, vec![0, 0], energy);
    (sim, id)
}

fn dr(sim: &Simulation, id: u32, index: usize) -> Value {
    sim.organism(id).expect("organism alive").drs[index].clone()
}

#[test]
fn test_straight_line_execution() {
    let (mut sim, id) = sim_with_program("SETI %DR0 DATA:7\nDONE:\nJMPI DONE\n", vec![32, 32], 1000);
    for _ in 0..5 {
        sim.tick();
    }
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(7)));
    assert!(!sim.organism(id).unwrap().last_failure);
}

#[test]
fn test_energy_is_charged_per_instruction() {
    let (mut sim, id) = sim_with_program("DONE:\nJMPI DONE\n", vec![16, 16], 100);
    sim.tick();
    sim.tick();
    assert_eq!(sim.organism(id).unwrap().energy, 98);
}

#[test]
fn test_organism_dies_when_energy_runs_out() {
    let (mut sim, id) = sim_with_program("DONE:\nJMPI DONE\n", vec![16, 16], 2);
    sim.tick();
    assert!(sim.organism(id).is_some());
    sim.tick();
    assert!(sim.organism(id).is_none(), "organism must be removed at energy 0");
}

#[test]
fn test_ret_without_frame_kills() {
    let (mut sim, id) = sim_with_program("RET\n", vec![16, 16], 1000);
    sim.tick();
    assert!(sim.organism(id).is_none());
}

#[test]
fn test_non_code_cell_is_charged_noop_failure() {
    let mut sim = Simulation::new(cfg(vec![16, 16]));
    sim.env.set(&[0, 0], Molecule::data(9));
    let id = sim.spawn_organism(0, vec![0, 0], 100);
    let state = sim.tick();
    let org = &state.organisms[0];
    assert!(org.last_failure);
    assert_eq!(org.energy, 99);
    // The pointer moved one cell past the undecodable word.
    assert_eq!(org.ip, vec![1, 0]);
    assert_eq!(sim.organism(id).unwrap().ip, vec![1, 0]);
}

#[test]
fn test_conditional_skip() {
    let source = "\
SETI %DR0 DATA:0
IFEI %DR0 DATA:0
SETI %DR1 DATA:1
SETI %DR2 DATA:1
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 1000);
    for _ in 0..6 {
        sim.tick();
    }
    // Predicate holds: both stores execute.
    assert_eq!(dr(&sim, id, 1), Value::Scalar(Molecule::data(1)));
    assert_eq!(dr(&sim, id, 2), Value::Scalar(Molecule::data(1)));

    let source = source.replace("SETI %DR0 DATA:0", "SETI %DR0 DATA:5");
    let (mut sim, id) = sim_with_program(&source, vec![32, 32], 1000);
    for _ in 0..6 {
        sim.tick();
    }
    // Predicate fails: the next instruction is skipped, the one after runs.
    assert_eq!(dr(&sim, id, 1), Value::Scalar(Molecule::data(0)));
    assert_eq!(dr(&sim, id, 2), Value::Scalar(Molecule::data(1)));
}

#[test]
fn test_conflict_lowest_id_wins() {
    let shape = vec![32, 32];
    let poker1 = compile("SETI %DR0 DATA:1\nPOKE %DR0 5|5\nDONE:\nJMPI DONE\n", &shape);
    let poker2 = compile("SETI %DR0 DATA:2\nPOKE %DR0 5|-3\nDONE:\nJMPI DONE\n", &shape);

    let mut sim = Simulation::new(cfg(shape));
    sim.register_artifact(poker1.clone());
    sim.register_artifact(poker2.clone());
    let first = sim.place_program(poker1.program_id, &[0, 0], 1000).unwrap();
    let second = sim.place_program(poker2.program_id, &[0, 8], 1000).unwrap();
    assert_eq!((first, second), (1, 2));

    sim.tick(); // both SETI
    let state = sim.tick(); // both POKE [5,5]

    let o1 = state.organisms.iter().find(|o| o.id == 1).unwrap();
    let o2 = state.organisms.iter().find(|o| o.id == 2).unwrap();
    assert_eq!(o1.conflict_status, ConflictStatus::WonExecution);
    assert_eq!(o2.conflict_status, ConflictStatus::LostLowerIdWon);
    assert!(!o1.last_failure);
    assert!(!o2.last_failure);

    // The cell holds the winner's molecule and ownership.
    assert_eq!(sim.env.get(&[5, 5]), Molecule::data(1));
    assert_eq!(sim.env.owner_of(&[5, 5]), 1);
    // The loser was still charged for the attempt (full base cost by
    // default).
    assert_eq!(o2.energy, 998);
}

#[test]
fn test_poke_onto_occupied_cell_blocks() {
    let source = "SETI %DR0 DATA:1\nPOKE %DR0 5|5\nDONE:\nJMPI DONE\n";
    let shape = vec![32, 32];
    let artifact = compile(source, &shape);
    let mut sim = Simulation::new(cfg(shape));
    sim.register_artifact(artifact.clone());
    sim.env.set(&[5, 5], Molecule::structure(1));
    let id = sim.place_program(artifact.program_id, &[0, 0], 1000).unwrap();

    sim.tick();
    let state = sim.tick();
    let org = state.organisms.iter().find(|o| o.id == id).unwrap();
    assert_eq!(org.conflict_status, ConflictStatus::TargetOccupied);
    assert_eq!(sim.env.get(&[5, 5]), Molecule::structure(1));
}

#[test]
fn test_peek_consumes_and_scan_does_not() {
    let source = "PEEK %DR0 3|3\nSCAN %DR1 4|4\nDONE:\nJMPI DONE\n";
    let shape = vec![32, 32];
    let artifact = compile(source, &shape);
    let mut sim = Simulation::new(cfg(shape));
    sim.register_artifact(artifact.clone());
    sim.env.set(&[3, 3], Molecule::data(11));
    sim.env.set(&[4, 4], Molecule::data(22));
    let id = sim.place_program(artifact.program_id, &[0, 0], 1000).unwrap();

    sim.tick();
    sim.tick();
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(11)));
    assert_eq!(dr(&sim, id, 1), Value::Scalar(Molecule::data(22)));
    assert!(sim.env.get(&[3, 3]).is_empty(), "PEEK takes the molecule");
    assert_eq!(sim.env.get(&[4, 4]), Molecule::data(22), "SCAN leaves the cell");
}

#[test]
fn test_peek_empty_cell_reports_target_empty() {
    let (mut sim, id) = sim_with_program("PEEK %DR0 9|9\nDONE:\nJMPI DONE\n", vec![32, 32], 1000);
    let state = sim.tick();
    let org = state.organisms.iter().find(|o| o.id == id).unwrap();
    assert_eq!(org.conflict_status, ConflictStatus::TargetEmpty);
}

#[test]
fn test_harvest_converts_energy_molecule() {
    let source = "HARV 2|2\nDONE:\nJMPI DONE\n";
    let shape = vec![32, 32];
    let artifact = compile(source, &shape);
    let mut sim = Simulation::new(cfg(shape));
    sim.register_artifact(artifact.clone());
    sim.env.set(&[2, 2], Molecule::energy(50));
    let id = sim.place_program(artifact.program_id, &[0, 0], 100).unwrap();

    sim.tick();
    // 100 - 1 (HARV cost) + 50 harvested.
    assert_eq!(sim.organism(id).unwrap().energy, 149);
    assert!(sim.env.get(&[2, 2]).is_empty());
}

#[test]
fn test_procedure_call_copy_out_without_artifact() {
    // With an empty artifact table the FPR binding chain is unavailable;
    // the emitted PUSH/POP sequences alone must carry the argument in and
    // the result back out.
    let source = "\
SETI %DR0 DATA:41
CALL INC WITH %DR0
DONE:
JMPI DONE
.PROC INC WITH VALUE
ADDI VALUE DATA:1
RET
.ENDP
";
    let (mut sim, id) = sim_code_only(source, vec![32, 32], 1000);
    for _ in 0..30 {
        sim.tick();
    }
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(42)));
    assert!(!sim.organism(id).unwrap().last_failure);
}

#[test]
fn test_procedure_call_with_artifact_bindings() {
    let source = "\
SETI %DR0 DATA:41
CALL INC WITH %DR0
DONE:
JMPI DONE
.PROC INC WITH VALUE
ADDI VALUE DATA:1
RET
.ENDP
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 1000);
    for _ in 0..30 {
        sim.tick();
    }
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(42)));
    assert!(!sim.organism(id).unwrap().last_failure);
}

#[test]
fn test_nested_calls_preserve_procedure_registers() {
    // OUTER clobbers %PR0, calls INNER (which also clobbers %PR0), and
    // checks its own value survived the inner RET.
    let source = "\
SETI %PR0 DATA:1
CALL OUTER
DONE:
JMPI DONE
.PROC OUTER
SETI %PR0 DATA:2
CALL INNER
SETR %DR5 %PR0
RET
.ENDP
.PROC INNER
SETI %PR0 DATA:3
RET
.ENDP
";
    let (mut sim, id) = sim_with_program(source, vec![48, 48], 2000);
    for _ in 0..30 {
        sim.tick();
    }
    // OUTER saw its own %PR0 after INNER returned.
    assert_eq!(dr(&sim, id, 5), Value::Scalar(Molecule::data(2)));
    // The caller's %PR0 was restored by OUTER's RET.
    assert_eq!(
        sim.organism(id).unwrap().prs[0],
        Value::Scalar(Molecule::data(1))
    );
}

#[test]
fn test_forked_child_executes_independently() {
    let source = "\
SETI %DR1 DATA:10
CALL DOUBLE WITH %DR1
SETI %DR2 DATA:300
FORK %DR2 CHILD
PARENT:
JMPI PARENT
.PROC DOUBLE WITH X
MULI X DATA:2
RET
.ENDP
.ORG 0|30
CHILD:
SETI %DR1 DATA:5
CALL DOUBLE WITH %DR1
CHILD_DONE:
JMPI CHILD_DONE
";
    let (mut sim, parent) = sim_with_program(source, vec![64, 64], 10_000);
    for _ in 0..40 {
        sim.tick();
    }
    assert_eq!(sim.organisms.len(), 2, "parent and one child");
    let child = sim.organisms[1].id;
    assert_ne!(parent, child);

    assert_eq!(dr(&sim, parent, 1), Value::Scalar(Molecule::data(20)));
    assert_eq!(dr(&sim, child, 1), Value::Scalar(Molecule::data(10)));
    assert!(!sim.organism(parent).unwrap().last_failure);
    assert!(!sim.organism(child).unwrap().last_failure);
    // The transferred energy came out of the parent.
    assert!(sim.organism(child).unwrap().energy <= 300);
    assert!(sim.organism(parent).unwrap().energy < 10_000 - 300);
}

#[test]
fn test_fork_with_insufficient_energy_fails() {
    let source = "\
SETI %DR2 DATA:500
FORK %DR2 CHILD
DONE:
JMPI DONE
.ORG 0|20
CHILD:
NOP
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 100);
    sim.tick();
    let state = sim.tick();
    let org = state.organisms.iter().find(|o| o.id == id).unwrap();
    assert!(org.last_failure);
    assert_eq!(sim.organisms.len(), 1, "no child spawned");
}

#[test]
fn test_snapshot_cells_and_ownership() {
    let mut config = cfg(vec![16, 16]);
    config.snapshot_cells = true;
    let shape = config.shape.clone();
    let artifact = compile("DONE:\nJMPI DONE\n", &shape);
    let mut sim = Simulation::new(config);
    sim.register_artifact(artifact.clone());
    let id = sim.place_program(artifact.program_id, &[0, 0], 100).unwrap();

    let state = sim.tick();
    let cells = state.cells.expect("cells requested");
    assert!(!cells.is_empty());
    assert!(cells.iter().all(|c| c.owner == id));
}

#[test]
fn test_run_ticks_feeds_sink() {
    let (mut sim, _) = sim_with_program("DONE:\nJMPI DONE\n", vec![16, 16], 1000);
    let mut sink = CollectSink::default();
    sim.run_ticks(5, &mut sink).unwrap();
    assert_eq!(sink.states.len(), 5);
    let ticks: Vec<u64> = sink.states.iter().map(|s| s.tick).collect();
    assert_eq!(ticks, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_geyser_state_round_trips() {
    let mut geyser = GeyserDistribution::new(GeyserConfig {
        seed: 42,
        interval: 1,
        amount: 10,
        sites: 2,
    });
    let mut env = crate::world::Environment::new(vec![16, 16], true);
    geyser.distribute(0, &mut env);
    let state = geyser.snapshot_state();

    let mut restored = GeyserDistribution::new(GeyserConfig::default());
    restored.restore_state(state).unwrap();
    // Both produce identical placements from here on.
    let mut env_a = crate::world::Environment::new(vec![16, 16], true);
    let mut env_b = crate::world::Environment::new(vec![16, 16], true);
    geyser.distribute(1, &mut env_a);
    restored.distribute(1, &mut env_b);
    let a: Vec<_> = env_a.occupied_cells().collect();
    let b: Vec<_> = env_b.occupied_cells().collect();
    assert_eq!(a, b);
}

#[test]
fn test_lcg_is_deterministic() {
    let mut a = Lcg::new(7);
    let mut b = Lcg::new(7);
    for _ in 0..100 {
        assert_eq!(a.next_u64(), b.next_u64());
    }
}

#[test]
fn test_world_seed_round_trip_and_load() {
    let shape = vec![24, 24];
    let artifact = compile("DONE:\nJMPI DONE\n", &shape);
    let seed = WorldSeed {
        shape: shape.clone(),
        toroidal: true,
        initial_molecules: vec![(vec![9, 9], Molecule::energy(100))],
        organisms: vec![SeedOrganism {
            program_id: artifact.program_id,
            start: vec![0, 0],
            energy: 500,
        }],
    };
    let json = serde_json::to_string(&seed).unwrap();
    let seed: WorldSeed = serde_json::from_str(&json).unwrap();

    let mut sim = Simulation::from_seed(&seed, &[artifact], cfg(vec![1, 1])).unwrap();
    assert_eq!(sim.env.shape(), &[24, 24]);
    assert_eq!(sim.env.get(&[9, 9]), Molecule::energy(100));
    assert_eq!(sim.organisms.len(), 1);
    sim.tick();
    assert!(!sim.organisms[0].last_failure);
}

#[test]
fn test_bitwise_family() {
    let source = "\
SETI %DR0 DATA:12
ANDI %DR0 DATA:10
SETI %DR1 DATA:12
ORI %DR1 DATA:3
SETI %DR2 DATA:12
XORI %DR2 DATA:10
SETI %DR3 DATA:1
SHLI %DR3 DATA:4
SETI %DR4 DATA:0
NOTR %DR4
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![64, 64], 1000);
    for _ in 0..12 {
        sim.tick();
    }
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(8)));
    assert_eq!(dr(&sim, id, 1), Value::Scalar(Molecule::data(15)));
    assert_eq!(dr(&sim, id, 2), Value::Scalar(Molecule::data(6)));
    assert_eq!(dr(&sim, id, 3), Value::Scalar(Molecule::data(16)));
    assert_eq!(dr(&sim, id, 4), Value::Scalar(Molecule::data(-1)));
}

#[test]
fn test_division_by_zero_is_a_failure() {
    let source = "SETI %DR0 DATA:5\nDIVI %DR0 DATA:0\nDONE:\nJMPI DONE\n";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 1000);
    sim.tick();
    let state = sim.tick();
    let org = state.organisms.iter().find(|o| o.id == id).unwrap();
    assert!(org.last_failure);
    // The destination is untouched.
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(5)));
}

#[test]
fn test_stack_family() {
    let source = "\
PUSI DATA:1
PUSI DATA:2
SWAP
POP %DR0
POP %DR1
PUSI DATA:7
DUP
POP %DR2
POP %DR3
PUSI DATA:8
PUSI DATA:9
DROP
POP %DR4
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![64, 64], 1000);
    for _ in 0..15 {
        sim.tick();
    }
    // SWAP exchanged the top two.
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(1)));
    assert_eq!(dr(&sim, id, 1), Value::Scalar(Molecule::data(2)));
    // DUP doubled the top.
    assert_eq!(dr(&sim, id, 2), Value::Scalar(Molecule::data(7)));
    assert_eq!(dr(&sim, id, 3), Value::Scalar(Molecule::data(7)));
    // DROP discarded the 9.
    assert_eq!(dr(&sim, id, 4), Value::Scalar(Molecule::data(8)));
}

#[test]
fn test_vector_family() {
    let source = "\
SETV %DR0 3|4
SETV %DR1 1|1
VADD %DR0 %DR1
VGET %DR2 %DR0 DATA:1
VSET %DR0 DATA:0 %DR2
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![64, 64], 1000);
    for _ in 0..7 {
        sim.tick();
    }
    assert_eq!(dr(&sim, id, 0), Value::Vector(vec![5, 5]));
    assert_eq!(dr(&sim, id, 2), Value::Scalar(Molecule::data(5)));
}

#[test]
fn test_location_family() {
    let source = "\
LSTO %LR0
LADD %LR0 3|4
PUSL %LR0
POPL %LR1
LLD %LR1
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 1000);
    for _ in 0..7 {
        sim.tick();
    }
    let org = sim.organism(id).unwrap();
    assert_eq!(org.lrs[0], vec![3, 4]);
    assert_eq!(org.lrs[1], vec![3, 4]);
    // LLD moved the active data pointer to the stored location.
    assert_eq!(org.dps[org.active_dp], vec![3, 4]);
}

#[test]
fn test_state_family() {
    let source = "\
SETDP DATA:1
ADDDP 2|0
SYNC
DIFF %DR3
ENGY %DR4
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 100);
    for _ in 0..6 {
        sim.tick();
    }
    let org = sim.organism(id).unwrap();
    assert_eq!(org.active_dp, 1);
    // SYNC parked the active data pointer on the SYNC cell; DIFF measured
    // from there to its own cell, one step along +x.
    assert_eq!(dr(&sim, id, 3), Value::Vector(vec![1, 0]));
    // ENGY observed the energy after its own cost was charged.
    assert_eq!(dr(&sim, id, 4), Value::Scalar(Molecule::data(95)));
}

#[test]
fn test_turn_redirects_execution() {
    let source = "\
TURN 0|1
.ORG 0|3
.DIR 0|1
SETI %DR0 DATA:9
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 1000);
    for _ in 0..4 {
        sim.tick();
    }
    assert_eq!(sim.organism(id).unwrap().dv, vec![0, 1]);
    assert_eq!(dr(&sim, id, 0), Value::Scalar(Molecule::data(9)));
}

#[test]
fn test_jmpr_jumps_by_vector_register() {
    let source = "\
SETV %DR0 5|0
JMPR %DR0
.ORG 9|0
SETI %DR1 DATA:1
DONE:
JMPI DONE
";
    let (mut sim, id) = sim_with_program(source, vec![32, 32], 1000);
    for _ in 0..4 {
        sim.tick();
    }
    assert_eq!(dr(&sim, id, 1), Value::Scalar(Molecule::data(1)));
    assert!(!sim.organism(id).unwrap().last_failure);
}

#[test]
fn test_runner_stops_after_max_ticks() {
    let (sim, _) = sim_with_program("DONE:\nJMPI DONE\n", vec![16, 16], 100_000);
    let (sink, rx) = ChannelSink::bounded(16);
    let runner = runner::SimulationRunner::spawn(sim, Box::new(sink), Some(5));
    let states: Vec<TickState> = rx.iter().collect();
    assert_eq!(states.len(), 5);
    let sim = runner.shutdown();
    assert_eq!(sim.current_tick(), 5);
}

#[test]
fn test_runner_pause_resume() {
    let (sim, _) = sim_with_program("DONE:\nJMPI DONE\n", vec![16, 16], 100_000);
    let runner = runner::SimulationRunner::spawn(sim, Box::new(NullSink), None);
    runner.pause();
    runner.resume();
    let sim = runner.shutdown();
    assert!(sim.organisms[0].energy > 0);
}

fn determinism_world() -> Simulation {
    let shape = vec![24, 24];
    let source = "\
LOOP:
ADDI %DR0 DATA:1
SCAN %DR1 1|1
JMPI LOOP
";
    let artifact = compile(source, &shape);
    let mut config = cfg(shape);
    config.snapshot_cells = true;
    let mut sim = Simulation::new(config);
    sim.register_artifact(artifact.clone());
    sim.place_program(artifact.program_id, &[0, 0], 50_000).unwrap();
    sim.place_program(artifact.program_id, &[0, 12], 50_000).unwrap();
    sim.set_energy_distribution(Box::new(GeyserDistribution::new(GeyserConfig {
        seed: 99,
        interval: 7,
        amount: 25,
        sites: 3,
    })));
    sim
}

#[test]
fn test_determinism_over_ten_thousand_ticks() {
    let mut a = determinism_world();
    let mut b = determinism_world();
    for tick in 0..10_000 {
        let sa = a.tick();
        let sb = b.tick();
        assert_eq!(sa, sb, "tick {tick} diverged");
    }
}
