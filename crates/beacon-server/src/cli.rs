use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "beacon-server", about = "Beacon real-time gateway")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/beacon.toml")]
    pub config: String,
}
