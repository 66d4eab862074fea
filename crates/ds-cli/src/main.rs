//! De-Slopify CLI
//!
//! Developer tool for checking text against the slop detector and replaying
//! feed fixtures through the scanner on a virtual clock.

mod check;
mod simulate;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ds-cli")]
#[command(about = "De-Slopify detector and feed simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify text as slop or clean
    Check {
        /// Texts to classify (reads stdin when empty and no file is given)
        text: Vec<String>,

        /// Classify each line of a file
        #[arg(short, long)]
        file: Option<String>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replay a feed fixture through the scheduler
    Simulate {
        /// Feed fixture (JSON)
        #[arg(short, long)]
        fixture: String,

        /// Scanner config overrides (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Simulated time in milliseconds
        #[arg(short, long, default_value_t = 30_000)]
        duration: u64,

        /// Pixels to scroll at each scroll tick (0 disables scrolling)
        #[arg(long, default_value_t = 0.0)]
        scroll_step: f64,

        /// Milliseconds between scroll ticks
        #[arg(long, default_value_t = 1000)]
        scroll_interval: u64,

        /// Start with the feature disabled
        #[arg(long)]
        disabled: bool,

        /// List every post with its classification at the end
        #[arg(short, long)]
        list: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { text, file, json } => check::run_check(&text, file.as_deref(), json),
        Commands::Simulate {
            fixture,
            config,
            duration,
            scroll_step,
            scroll_interval,
            disabled,
            list,
        } => simulate::run_simulate(simulate::SimulateOptions {
            fixture_path: fixture,
            config_path: config,
            duration,
            scroll_step,
            scroll_interval,
            enabled: !disabled,
            list,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
