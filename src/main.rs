//! nested-router command line.
//!
//! Inspect a TOML route configuration without a rendering layer.
//!
//! ```text
//! nested-router match    --config router.toml /users/42
//! nested-router validate --config router.toml
//! nested-router active   --config router.toml --current /users/42 /users
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use nested_router::config::{load_config, ConfigError};
use nested_router::history::{Action, Location, LocationDescriptor, MemoryHistory};
use nested_router::observability::logging::init_logging;
use nested_router::routing::Resolver;
use nested_router::transition::RouterState;
use nested_router::Router;

#[derive(Parser)]
#[command(name = "nested-router")]
#[command(about = "Resolve and inspect nested route configurations", long_about = None)]
struct Cli {
    /// Route configuration file (TOML).
    #[arg(short, long, global = true, default_value = "router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the branch, params and components matched by a path
    Match {
        /// Path to resolve, e.g. `/users/42?tab=posts`
        path: String,
    },
    /// Check the configuration and report every problem
    Validate,
    /// Tell whether a link is active while another path is current
    Active {
        /// Current location
        #[arg(long)]
        current: String,
        /// Link target to check
        candidate: String,
        /// Require an exact pathname match
        #[arg(long)]
        index_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            eprintln!("{}: invalid configuration", cli.config.display());
            for error in &errors {
                eprintln!("  - {}", error);
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };
    init_logging(&config.logging.level);

    match cli.command {
        Commands::Validate => {
            println!(
                "{}: ok ({} top-level routes)",
                cli.config.display(),
                config.routes.len()
            );
        }
        Commands::Match { path } => {
            let routes = config.build_routes()?;
            let location = Location::new(LocationDescriptor::parse(&path), Action::Pop, "cli");
            let resolver = Resolver::new(config.matching.decode_params);

            match resolver.resolve(&routes, &location).await {
                Ok(matched) => {
                    let state = RouterState {
                        location,
                        routes: matched.routes,
                        params: matched.params,
                        components: matched.components,
                    };
                    println!("{}", serde_json::to_string_pretty(&state)?);
                }
                Err(err) => {
                    eprintln!("Error: {}", err);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Active {
            current,
            candidate,
            index_only,
        } => {
            let router = Router::builder()
                .history(Arc::new(MemoryHistory::new(current.as_str())))
                .config(config)
                .on_error(|err| eprintln!("Error: {}", err))
                .build()?;
            router.start()?;

            let active = router.is_active(candidate.as_str(), index_only);
            router.stop();
            println!("{}", active);
            if !active {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
