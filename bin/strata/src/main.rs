//! Strata reverse geocoder.
//!
//! Loads Who's On First polygon layers into per-layer search units and answers
//! point lookups with the containing feature's full ancestor chain.

mod commands;
mod config;
mod logging;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata_pip::Layer;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "strata", version)]
#[command(about = "Reverse geocoding over Who's On First polygon layers")]
struct Args {
	/// Config file (default: $XDG_CONFIG_HOME/strata/strata.toml)
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Directory holding `<layer>.geojson` files
	#[arg(short, long, value_name = "DIR", global = true)]
	datapath: Option<PathBuf>,

	/// Prefer English names for administrative features
	#[arg(long, global = true)]
	localized_admin_names: bool,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Look up a single coordinate
	#[command(allow_negative_numbers = true)]
	Lookup {
		lat: f64,
		lon: f64,
		/// Restrict the search to these layers
		#[arg(long, value_delimiter = ',')]
		layers: Option<Vec<Layer>>,
	},
	/// Read `lat,lon` lines from stdin and write one JSON answer per line
	Batch {
		/// Restrict the search to these layers
		#[arg(long, value_delimiter = ',')]
		layers: Option<Vec<Layer>>,
	},
	/// Look up a postal code
	Postal {
		country: String,
		code: String,
		/// Postal table JSON file (overrides `postal_table` in the config)
		#[arg(long, value_name = "FILE")]
		table: Option<PathBuf>,
	},
	/// Load the configured layers and report which are active
	Layers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	logging::setup_tracing(args.verbose);

	let mut config = Config::load(args.config.as_deref())?;
	if let Some(datapath) = args.datapath {
		config.datapath = datapath;
	}
	config.localized_admin_names |= args.localized_admin_names;

	match args.command {
		Command::Lookup { lat, lon, layers } => commands::lookup(&config, lat, lon, layers).await,
		Command::Batch { layers } => commands::batch(&config, layers).await,
		Command::Postal { country, code, table } => commands::postal(&config, &country, &code, table),
		Command::Layers => commands::layers(&config).await,
	}
}
