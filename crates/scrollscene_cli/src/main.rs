//! ScrollScene CLI
//!
//! Simulate scroll paths over a TOML page description and print what the
//! scene engine does.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod page;
mod trace;

use page::PageConfig;
use trace::Simulation;

#[derive(Parser)]
#[command(name = "scrollscene")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Headless scroll scene simulator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Visit the page's scroll positions and print every event
    Trace {
        /// Page description file
        page: PathBuf,

        /// Scroll positions to visit instead of the page's own
        #[arg(short, long, value_delimiter = ',')]
        positions: Option<Vec<f64>>,
    },

    /// Load a page and print each scene's scroll window
    Check {
        /// Page description file
        page: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Trace { page, positions } => cmd_trace(&page, positions),
        Commands::Check { page } => cmd_check(&page),
    }
}

fn cmd_trace(path: &Path, positions: Option<Vec<f64>>) -> Result<()> {
    let page = PageConfig::load(path)?;
    let sim = Simulation::build(&page)?;
    let positions = positions.unwrap_or_else(|| page.scroll.positions.clone());
    if positions.is_empty() {
        anyhow::bail!("No scroll positions given in {} or on the command line", path.display());
    }
    info!("Tracing {} over {} positions", path.display(), positions.len());

    for line in sim.take_trace() {
        println!("{}", line);
    }
    for position in positions {
        sim.visit(position);
        for line in sim.take_trace() {
            println!("{}", line);
        }
    }

    println!();
    print_summary(&sim);
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let page = PageConfig::load(path)?;
    let sim = Simulation::build(&page)?;
    let viewport = sim.document().viewport();
    info!(
        "{}: {}x{} viewport, {} elements, {} scenes",
        path.display(),
        viewport.width,
        viewport.height,
        page.elements.len(),
        page.scenes.len()
    );
    print_summary(&sim);
    Ok(())
}

fn print_summary(sim: &Simulation) {
    for scene in sim.summary() {
        println!(
            "{:<16} {:>8} .. {:<8} {:<7} {:.3}",
            scene.name,
            scene.scroll_offset.start,
            scene.scroll_offset.end,
            scene.state.as_str(),
            scene.progress
        );
    }
}
