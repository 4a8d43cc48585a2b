use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "salon-booking")]
#[command(about = "Salon appointment booking service backed by Square")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "salon.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Override server.port from config
    #[arg(long)]
    pub port: Option<u16>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}
