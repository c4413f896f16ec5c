use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use factory_core::{run_simulation, seed_goals, RunLimits, RunOutcome};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "factory_sim",
    about = "Self-replicating solar factory simulation"
)]
struct Cli {
    /// Spec file (JSON or YAML). The built-in catalog is used when omitted.
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Profile from the spec's `profiles` map to merge onto its base config.
    #[arg(long)]
    profile: Option<String>,

    /// Simulated-time horizon in hours.
    #[arg(long, default_value_t = 10_000.0)]
    max_hours: f32,

    /// Run log output path.
    #[arg(long, default_value = "factory_simulation_log.json")]
    output: PathBuf,

    /// RNG seed. Random when omitted; fixed seeds reproduce runs exactly.
    #[arg(long)]
    seed: Option<u64>,

    /// Wall-clock budget in seconds. Exceeding it aborts with no report.
    #[arg(long, default_value_t = 3_600.0)]
    max_wall_seconds: f32,

    /// Load and validate the spec, print a summary, and exit.
    #[arg(long)]
    validate: bool,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(rand::random);

    let (content, mut state) =
        factory_spec::load_factory(cli.spec.as_deref(), cli.profile.as_deref(), seed)
            .context("loading factory spec")?;

    println!(
        "Factory: {} resources, {} recipes, {} module kinds, {} targets (seed {seed})",
        content.catalog.resource_count(),
        content.catalog.recipes().count(),
        content.catalog.module_kind_count(),
        content.target_modules.len(),
    );

    if cli.validate {
        println!("Spec OK.");
        return Ok(());
    }

    seed_goals(&mut state, &content).context("seeding replication goals")?;
    info!(
        goals = state.goal_tasks.len(),
        tasks = state.sched.tasks.len(),
        "goals seeded"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let report = run_simulation(
        &mut state,
        &content,
        &mut rng,
        RunLimits {
            max_hours: cli.max_hours,
            max_wall_seconds: cli.max_wall_seconds,
        },
    )
    .context("running simulation")?;

    let outcome = match report.outcome {
        RunOutcome::GoalsAchieved => "goals achieved",
        RunOutcome::DeadlockDetected => "deadlock detected",
        RunOutcome::TimeExhausted => "time horizon reached",
    };
    let status = &report.run_log.final_status;
    println!("{}", "-".repeat(72));
    println!("Outcome: {outcome} at t={:.1} h", status.time);
    println!(
        "Tasks: {} completed, {} active, {} blocked",
        status.completed_tasks, status.active_tasks, status.blocked_tasks
    );
    let modules: Vec<String> = status
        .modules
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect();
    println!("Modules: {}", modules.join(", "));
    println!(
        "Waste: {:.1} t, transports: {}, software packages: {}",
        status.waste_total, status.transport_completed, status.software_packages
    );

    let file = std::fs::File::create(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    serde_json::to_writer_pretty(file, &report.run_log)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    println!("Run log written to {}", cli.output.display());

    Ok(())
}
