//! DrinkMaster client core: finds the backend base URL on the local network,
//! keeps it for the session and remembers it across restarts.

pub mod api;
pub mod candidates;
pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod probe;
pub mod scanner;
pub mod storage;
pub mod store;
pub mod url;

pub use api::ApiClient;
pub use candidates::{CandidateGenerator, SubnetPrefix, COMMON_PREFIXES, PRIORITY_OCTETS};
pub use config::{DiscoveryConfig, DEFAULT_PORT, HEALTH_PATH};
pub use discovery::{Discovery, Tier};
pub use error::{DiscoveryError, Result};
pub use network::{InterfaceAddress, LocalAddress, StaticAddress};
pub use probe::{HealthProbe, HttpProbe};
pub use storage::{KeyringStorage, MemoryStorage, UrlStorage};
pub use store::BaseUrlStore;
pub use url::BaseUrl;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "drinkmaster-discovery",
    version,
    about = "Locate the DrinkMaster backend on the local network"
)]
struct CliArgs {
    /// Skip the cached URL and rediscover
    #[arg(short, long)]
    force: bool,
    /// Forget the remembered URL before discovering
    #[arg(long)]
    reset: bool,
    /// Print this path joined onto the base URL instead of the bare base URL
    path: Option<String>,
}

async fn resolve(args: CliArgs) -> Result<String> {
    let config = DiscoveryConfig::load()?;
    let discovery = Discovery::with_defaults(config)?;
    if args.reset {
        discovery.store().forget().await;
    }
    discovery.ensure_base_url(args.force).await?;
    // Let the keyring write land before the process exits.
    discovery.store().flush().await;
    Ok(match args.path {
        Some(path) => discovery.build_url(&path),
        None => discovery.base_url(),
    })
}

/// Command-line entry point: prints the discovered base URL (or a URL built from
/// it) and exits non-zero when discovery fails.
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    match runtime.block_on(resolve(args)) {
        Ok(url) => println!("{}", url),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> std::result::Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("drinkmaster-discovery").chain(list.iter().copied()))
    }

    #[test]
    fn flags_and_path() {
        let parsed = args(&[]).unwrap();
        assert!(!parsed.force && !parsed.reset);
        assert_eq!(parsed.path, None);

        let parsed = args(&["--force", "--reset", "/drinks/available"]).unwrap();
        assert!(parsed.force && parsed.reset);
        assert_eq!(parsed.path.as_deref(), Some("/drinks/available"));

        assert!(args(&["-f"]).unwrap().force);
    }

    #[test]
    fn rejects_unknown_options_and_extra_paths() {
        assert!(args(&["--bogus"]).is_err());
        assert!(args(&["a", "b"]).is_err());
        let help = args(&["--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
