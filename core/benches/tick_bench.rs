use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use evochora_core::compiler::{self, CompileOptions};
use evochora_core::config::SimulationConfig;
use evochora_core::sim::Simulation;
use std::sync::Arc;

const COUNTER: &str = "\
LOOP:
ADDI %DR0 DATA:1
SCAN %DR1 1|1
JMPI LOOP
";

fn build_sim(organisms: usize) -> Simulation {
    let shape = vec![96, 96];
    let opts = CompileOptions::new(shape.clone(), true);
    let artifact = Arc::new(compiler::compile_source(COUNTER, "bench.evo", &opts).unwrap());
    let config = SimulationConfig {
        shape,
        toroidal: true,
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config);
    sim.register_artifact(artifact.clone());
    for i in 0..organisms {
        sim.place_program(artifact.program_id, &[0, (i * 4) as i64], 1_000_000)
            .unwrap();
    }
    sim
}

fn bench_tick(c: &mut Criterion) {
    for organisms in [1usize, 8, 16] {
        c.bench_function(&format!("tick_{organisms}_organisms_x100"), |b| {
            b.iter_batched(
                || build_sim(organisms),
                |mut sim| {
                    for _ in 0..100 {
                        sim.tick();
                    }
                    sim
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
