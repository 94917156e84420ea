//! Walking Sim CLI - Evaluate a genome against an environment description.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;

use walking_sim::{
    compute::{
        LogVisualizer, RapierWorld, Simulation,
        evolution::{DEFAULT_FORCE_BOUND, GenomeRng, decode, genome_len, random_genome},
        motor_count,
    },
    schema::{EnvironmentProps, SimulationConfig},
};

struct Args {
    config: PathBuf,
    genome: Option<PathBuf>,
    env_name: String,
    env_dir: PathBuf,
    render: bool,
}

fn usage(program: &str) {
    eprintln!("Usage: {} <config.json> [genome.json] [options]", program);
    eprintln!();
    eprintln!("Run one walking episode and print the fitness report.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json   Path to simulation configuration file");
    eprintln!("  genome.json   JSON array of forces (default: random genome)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --env NAME    Environment description (default: default)");
    eprintln!("  --env-dir DIR Directory holding NAME.json (default: environments)");
    eprintln!("  --render      Log body positions every tick");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut env_name = "default".to_string();
    let mut env_dir = PathBuf::from("environments");
    let mut render = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--env" => {
                env_name = iter.next().ok_or("--env needs a name")?.clone();
            }
            "--env-dir" => {
                env_dir = PathBuf::from(iter.next().ok_or("--env-dir needs a directory")?);
            }
            "--render" => render = true,
            other if other.starts_with("--") => return Err(format!("unknown option {other}")),
            other => positional.push(PathBuf::from(other)),
        }
    }

    let mut positional = positional.into_iter();
    let config = positional.next().ok_or("missing config path")?;
    Ok(Args {
        config,
        genome: positional.next(),
        env_name,
        env_dir,
        render,
    })
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    let args = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        usage(args.first().map_or("walking-sim", String::as_str));
        std::process::exit(1);
    });

    // Load configuration
    let config_str = fs::read_to_string(&args.config).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let props = EnvironmentProps::load_or_preset(&args.env_dir, &args.env_name).unwrap_or_else(|e| {
        eprintln!("Error loading environment: {}", e);
        std::process::exit(1);
    });

    // Load or generate genome
    let genome: Vec<f64> = match &args.genome {
        Some(path) => {
            let genome_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading genome file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&genome_str).unwrap_or_else(|e| {
                eprintln!("Error parsing genome: {}", e);
                std::process::exit(1);
            })
        }
        None => {
            let mut rng = match config.random_seed {
                Some(seed) => GenomeRng::new(seed),
                None => GenomeRng::random(),
            };
            random_genome(&config, &mut rng, DEFAULT_FORCE_BOUND)
        }
    };

    let forces = decode(&genome, motor_count(config.creature), config.intervals())
        .unwrap_or_else(|e| {
            eprintln!("Error: {} (expected {} values)", e, genome_len(&config));
            std::process::exit(1);
        });

    println!("Walking Simulation");
    println!("==================");
    println!("Creature: {}", config.creature);
    println!("Fitness: {}", config.fitness);
    println!("Environment: {} (gravity {:?})", args.env_name, props.gravity);
    println!("timestep: {}", config.timestep);
    println!("duration: {}s", config.duration);
    println!(
        "Genome: {} joints x {} intervals",
        forces.joints(),
        forces.intervals()
    );
    println!();

    let mut sim = Simulation::new(RapierWorld::new(), config, props).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });
    if args.render {
        sim = sim.with_visualizer(Box::new(LogVisualizer::default()));
    }

    // Ctrl-C stops the episode and still prints the partial report.
    let interrupt = sim.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || interrupt.store(true, Ordering::Relaxed)) {
        log::warn!("could not install Ctrl-C handler: {}", e);
    }

    println!("Running episode...");
    let start = Instant::now();
    let report = sim.run_schedule(&forces).unwrap_or_else(|e| {
        eprintln!("Episode failed: {}", e);
        std::process::exit(1);
    });
    sim.close();
    let elapsed = start.elapsed();

    println!();
    if report.interrupted {
        println!("Interrupted, partial result:");
    }
    println!("Result: {:?}", report.termination);
    println!("  Steps: {}", report.steps);
    println!("  Simulated time: {:.3}s", report.sim_time);
    println!("  Distance: {:.3}", report.distance);
    println!("  Fitness: {:.6}", report.fitness);
    for (name, value) in &report.components {
        println!("    {:<16} {:.6}", name, value);
    }
    println!();
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        report.steps as f32 / elapsed.as_secs_f32()
    );
}

fn print_example_config() {
    let config = SimulationConfig::default();
    let props = EnvironmentProps::default();

    println!("Example configuration (config.json):");
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );
    println!();
    println!("Example environment (environments/default.json):");
    println!("{}", serde_json::to_string_pretty(&props).unwrap_or_default());
}
