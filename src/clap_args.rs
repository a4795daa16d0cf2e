use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author = "Oliver Winks (@ohuu), William Kimbell (@seal)", version, about, long_about = None)]
pub struct Args {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calculate energy and embodied emissions for a set of observations
    Run {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "cloudcarbon.toml")]
        config: String,

        /// Path to a JSON file containing an array of observations
        #[arg(short, long)]
        observations: String,
    },

    /// List the instance types known to the catalog
    Instances {
        /// Restrict the listing to a single provider (aws, gcp or azure)
        #[arg(short, long)]
        provider: Option<String>,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
