use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use witness::adapters::bd::BdTracker;
use witness::adapters::git::Git2Driver;
use witness::adapters::mail::CliMailRouter;
use witness::adapters::registry::FsWorkspaceRegistry;
use witness::adapters::tmux::TmuxDriver;
use witness::adapters::Collaborator;
use witness::cli::{Cli, Commands};
use witness::config::WitnessConfig;
use witness::witness::Context;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("witness=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let rig_root = cli.rig_root.unwrap_or_else(|| PathBuf::from("."));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli.command, rig_root))
}

async fn run(command: Commands, rig_root: PathBuf) -> Result<()> {
    let config_path = rig_root.join(".witness").join("config.toml");
    let config = WitnessConfig::load(&config_path)?;
    let mut rig = config.rig.clone().into_rig();
    if rig.root == PathBuf::from(".") {
        rig.root = rig_root.clone();
    }

    let tracker = BdTracker::new();
    let mux = TmuxDriver::new();
    let git = Git2Driver::new();
    let mail = CliMailRouter::new();
    let registry = FsWorkspaceRegistry::new();

    let ctx = Context {
        rig: &rig,
        config: &config,
        tracker: &tracker,
        mux: &mux,
        git: &git,
        mail: &mail,
        registry: &registry,
    };

    match command {
        Commands::Patrol => {
            let report = witness::witness::run_patrol_tick(&ctx).await;
            println!("patrol: rig={}", rig.name);
            println!(
                "  zombies:    checked={} found={} errors={}",
                report.zombie.checked,
                report.zombie.zombies.len(),
                report.zombie.errors.len()
            );
            for z in &report.zombie.zombies {
                println!("    {} [{}] -> {}", z.polecat, z.classification, z.action);
            }
            println!(
                "  stalled:    checked={} dismissed={} errors={}",
                report.stalled.checked,
                report.stalled.stalled.len(),
                report.stalled.errors.len()
            );
            println!(
                "  orphaned beads:     scanned={} recovered={} errors={}",
                report.orphaned_beads.scanned,
                report.orphaned_beads.recovered.len(),
                report.orphaned_beads.errors.len()
            );
            println!(
                "  orphaned molecules: scanned={} closed={} errors={}",
                report.orphaned_molecules.scanned,
                report.orphaned_molecules.closed.len(),
                report.orphaned_molecules.errors.len()
            );
        }

        Commands::Handle { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let envelope: witness::protocol::InboxEnvelope = serde_json::from_str(&raw)?;
            let result = witness::witness::dispatch(&ctx, &envelope).await;
            println!(
                "{} [{}] handled={} action={}",
                result.message_id, result.message_type, result.handled, result.action
            );
            if let Some(wisp) = &result.wisp_created {
                println!("  wisp_created: {}", wisp);
            }
            println!("  mail_sent: {}", result.mail_sent);
            if let Some(error) = &result.error {
                println!("  error: {}", error);
            }
        }

        Commands::Status => {
            println!("Witness Status");
            println!("==============");
            println!();
            println!("rig:  {}", rig.name);
            println!("root: {}", rig.root.display());
            println!();
            println!("Collaborators:");
            println!(
                "  issue tracker ({}): {}",
                tracker.name(),
                if tracker.is_available() { "available" } else { "not found" }
            );
            println!(
                "  multiplexer ({}):  {}",
                mux.name(),
                if mux.is_available() { "available" } else { "not found" }
            );
            println!(
                "  mail router ({}):  {}",
                mail.name(),
                if mail.is_available() { "available" } else { "not found" }
            );
            println!("  git ({}):           available", git.name());
            println!("  registry ({}):      available", registry.name());
        }
    }

    Ok(())
}
