use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use evochora_core::compiler::{self, CompileOptions};
use evochora_core::config::SimulationConfig;
use evochora_core::emit::{ArtifactInterchange, ProgramArtifact};
use evochora_core::preproc::FsResolver;
use evochora_core::sim::energy::{GeyserConfig, GeyserDistribution};
use evochora_core::sim::{Simulation, TickSink};

const DEFAULT_LOG_FILTER: &str = "evochora_core=info,evochora_cli=info";

#[derive(Debug, Parser)]
#[command(
    name = "evochora",
    author,
    version,
    about = "Compile and run programs for the Evochora spatial virtual machine",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a source file into an artifact JSON
    Compile {
        /// Source file (entry point; includes resolve relative to it)
        file: PathBuf,
        /// World shape, e.g. 100,100
        #[arg(long)]
        shape: String,
        /// Treat the world as bounded instead of toroidal
        #[arg(long)]
        bounded: bool,
        /// Output path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a simulation described by a TOML config
    Run {
        config: PathBuf,
        /// Override the tick count from the config
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print summary information about a compiled artifact
    Inspect { artifact: PathBuf },
}

/// Snapshots as one JSON object per line.
struct JsonLinesSink {
    out: std::io::BufWriter<fs::File>,
}

impl TickSink for JsonLinesSink {
    fn send(&mut self, state: evochora_core::sim::TickState) -> Result<()> {
        serde_json::to_writer(&mut self.out, &state)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.out.flush();
    }
}

#[derive(Debug, Deserialize)]
struct RunConfig {
    #[serde(default = "default_ticks")]
    ticks: u64,
    #[serde(default)]
    simulation: SimulationConfig,
    programs: Vec<ProgramEntry>,
    energy_geyser: Option<GeyserConfig>,
    /// Path for tick snapshots, one JSON object per line.
    output: Option<PathBuf>,
}

fn default_ticks() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
struct ProgramEntry {
    source: PathBuf,
    start: Vec<i64>,
    energy: i64,
}

fn parse_shape(s: &str) -> Result<Vec<i64>, String> {
    let shape: Result<Vec<i64>, _> = s.split(',').map(|p| p.trim().parse::<i64>()).collect();
    match shape {
        Ok(v) if !v.is_empty() && v.iter().all(|&n| n > 0) => Ok(v),
        _ => Err(format!("invalid shape '{s}', expected e.g. 100,100")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match CliArgs::parse().command {
        Commands::Compile {
            file,
            shape,
            bounded,
            output,
        } => {
            let shape = parse_shape(&shape).map_err(|e| anyhow!(e))?;
            cmd_compile(&file, shape, !bounded, output.as_deref())
        }
        Commands::Run { config, ticks } => cmd_run(&config, ticks),
        Commands::Inspect { artifact } => cmd_inspect(&artifact),
    }
}

fn compile_file(file: &Path, opts: &CompileOptions) -> Result<ProgramArtifact> {
    let resolver = FsResolver::new();
    let entry = file.to_string_lossy();
    compiler::compile(&resolver, &entry, opts).map_err(|err| anyhow!("{err}"))
}

fn cmd_compile(file: &Path, shape: Vec<i64>, toroidal: bool, output: Option<&Path>) -> Result<()> {
    let opts = CompileOptions::new(shape.clone(), toroidal);
    let artifact = compile_file(file, &opts)?;
    info!(
        program_id = format!("{:#018x}", artifact.program_id),
        words = artifact.machine_code_layout.len(),
        "compiled"
    );
    let interchange = artifact.to_interchange(&shape);
    let json = serde_json::to_string_pretty(&interchange)?;
    match output {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_run(config_path: &Path, ticks_override: Option<u64>) -> Result<()> {
    let text = fs::read_to_string(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let config: RunConfig = toml::from_str(&text)?;
    if config.programs.is_empty() {
        bail!("run config lists no programs");
    }
    let config_dir = config_path.parent().unwrap_or(Path::new("."));

    let opts = CompileOptions::new(config.simulation.shape.clone(), config.simulation.toroidal);
    let mut sim = Simulation::new(config.simulation.clone());
    for entry in &config.programs {
        let source = config_dir.join(&entry.source);
        let artifact = Arc::new(compile_file(&source, &opts)?);
        sim.register_artifact(artifact.clone());
        sim.place_program(artifact.program_id, &entry.start, entry.energy)?;
    }
    if let Some(geyser) = config.energy_geyser.clone() {
        sim.set_energy_distribution(Box::new(GeyserDistribution::new(geyser)));
    }

    let ticks = ticks_override.unwrap_or(config.ticks);
    info!(ticks, organisms = sim.organisms.len(), "running");
    match &config.output {
        Some(path) => {
            let file = fs::File::create(config_dir.join(path))?;
            let mut sink = JsonLinesSink {
                out: std::io::BufWriter::new(file),
            };
            sim.run_ticks(ticks, &mut sink)?;
            sink.close();
        }
        None => {
            let mut sink = evochora_core::sim::NullSink;
            sim.run_ticks(ticks, &mut sink)?;
        }
    }

    println!(
        "ran {ticks} tick(s): {} organism(s) alive at tick {}",
        sim.organisms.len(),
        sim.current_tick()
    );
    for org in &sim.organisms {
        println!(
            "  organism {}: ip {:?}, energy {}, last_failure {}",
            org.id, org.ip, org.energy, org.last_failure
        );
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let interchange: ArtifactInterchange = serde_json::from_str(&text)?;
    println!("program id: {:#018x}", interchange.program_id);
    println!("shape:      {:?}", interchange.shape);
    println!("words:      {}", interchange.machine_code_layout.len());
    println!("objects:    {}", interchange.initial_world_objects.len());
    if !interchange.label_address_to_name.is_empty() {
        println!("labels:");
        for (addr, name) in &interchange.label_address_to_name {
            println!("  {addr:>6}  {name}");
        }
    }
    if !interchange.proc_name_to_param_names.is_empty() {
        println!("procedures:");
        for (name, params) in &interchange.proc_name_to_param_names {
            println!("  {name}({})", params.join(", "));
        }
    }
    Ok(())
}
