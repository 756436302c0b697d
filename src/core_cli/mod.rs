use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "rouillehubd", about = "A distributed FTP master written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
