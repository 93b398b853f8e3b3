//! Command-line surface
//!
//! Each subcommand lives in its own module with an `execute` function that
//! returns an [`ExitCode`].

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rstore_core::{ConfigManager, Error, RemoteStorage as _, StorageConfig};
use rstore_s3::S3Storage;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
mod cp_object;
mod kind;
mod ls;
mod put;
mod rm;
mod stat;

/// rstore - pooled object-store client
#[derive(Parser, Debug)]
#[command(name = "rstore", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: $RSTORE_CONFIG_DIR/config.toml or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bucket, overriding the config file
    #[arg(long, global = true, env = "RSTORE_BUCKET")]
    pub bucket: Option<String>,

    /// Endpoint URL, overriding the config file
    #[arg(long, global = true, env = "RSTORE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Log every HTTP request and response
    #[arg(long, global = true, env = "RSTORE_DEBUG")]
    pub debug: bool,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            quiet: self.quiet,
        }
    }

    /// Layer command-line and environment settings over the file
    fn apply(&self, config: &mut StorageConfig) {
        if let Some(bucket) = &self.bucket {
            config.bucket = bucket.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if self.debug {
            config.debug = true;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List objects and prefixes
    Ls(ls::LsArgs),

    /// Stream an object to stdout
    Cat(cat::CatArgs),

    /// Upload a local file
    Put(put::PutArgs),

    /// Show object size and modification time
    Stat(stat::StatArgs),

    /// Delete an object
    Rm(rm::RmArgs),

    /// Server-side copy into the object-disk root
    CpObject(cp_object::CpObjectArgs),

    /// Print the backend kind
    Kind,
}

/// Execute the parsed command
pub async fn execute(cli: Cli) -> ExitCode {
    let global = cli.global;
    match cli.command {
        Commands::Ls(args) => ls::execute(args, &global).await,
        Commands::Cat(args) => cat::execute(args, &global).await,
        Commands::Put(args) => put::execute(args, &global).await,
        Commands::Stat(args) => stat::execute(args, &global).await,
        Commands::Rm(args) => rm::execute(args, &global).await,
        Commands::CpObject(args) => cp_object::execute(args, &global).await,
        Commands::Kind => kind::execute(&global).await,
    }
}

/// Resolve the config file and apply overrides
pub(crate) fn load_config(global: &GlobalArgs) -> anyhow::Result<StorageConfig> {
    let manager = match &global.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    let mut config = match manager.read()? {
        Some(config) => config,
        None if global.config.is_some() => {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                manager.config_path().display()
            ))
            .into());
        }
        None => StorageConfig::default(),
    };

    global.apply(&mut config);
    config
        .validate()
        .with_context(|| format!("Invalid config {}", manager.config_path().display()))?;
    Ok(config)
}

/// Load the config and connect, reporting failures through `formatter`
pub(crate) async fn open_storage(
    global: &GlobalArgs,
    formatter: &Formatter,
) -> Result<S3Storage, ExitCode> {
    let config = load_config(global).map_err(|e| {
        formatter.error(&format!("{e:#}"));
        ExitCode::from_anyhow(&e)
    })?;

    rstore_s3::connect(&config).await.map_err(|e| {
        formatter.error(&format!("Failed to connect: {e}"));
        ExitCode::from_error(&e)
    })
}

/// Close the storage, then hand back `code`
pub(crate) async fn finish(storage: S3Storage, code: ExitCode) -> ExitCode {
    if let Err(e) = storage.close().await {
        tracing::warn!(error = %e, "failed to close storage");
    }
    code
}

/// Report a failed operation and map it to an exit code
pub(crate) fn report(formatter: &Formatter, action: &str, error: &Error) -> ExitCode {
    formatter.error(&format!("{action}: {error}"));
    ExitCode::from_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn test_parse_ls_recursive() {
        let cli = parse(&["rstore", "ls", "-r", "shadow"]);
        match cli.command {
            Commands::Ls(args) => {
                assert!(args.recursive);
                assert_eq!(args.path, "shadow");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ls_defaults_to_root() {
        let cli = parse(&["rstore", "ls"]);
        match cli.command {
            Commands::Ls(args) => {
                assert!(!args.recursive);
                assert_eq!(args.path, "");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["rstore", "stat", "a/b.bin", "--json", "-vv"]);
        assert!(cli.global.json);
        assert_eq!(cli.global.verbose, 2);
        assert!(matches!(cli.command, Commands::Stat(_)));
    }

    #[test]
    fn test_parse_rm_object_disk() {
        let cli = parse(&["rstore", "rm", "--object-disk", "part.bin"]);
        match cli.command {
            Commands::Rm(args) => {
                assert!(args.object_disk);
                assert_eq!(args.path, "part.bin");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_cp_object() {
        let cli = parse(&["rstore", "cp-object", "src-bucket", "shadow/a.bin", "a.bin"]);
        match cli.command {
            Commands::CpObject(args) => {
                assert_eq!(args.src_bucket, "src-bucket");
                assert_eq!(args.src_key, "shadow/a.bin");
                assert_eq!(args.dst, "a.bin");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_put_requires_both_paths() {
        assert!(Cli::try_parse_from(["rstore", "put", "local.bin"]).is_err());
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bucket = \"from-file\"\npath = \"shadow\"\n").unwrap();

        let global = GlobalArgs {
            config: Some(path),
            bucket: Some("from-flag".to_string()),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            debug: true,
            ..Default::default()
        };

        let config = load_config(&global).unwrap();
        assert_eq!(config.bucket, "from-flag");
        assert_eq!(config.path, "shadow");
        assert_eq!(config.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(config.debug);
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let global = GlobalArgs {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };

        let err = load_config(&global).unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err), ExitCode::ConfigError);
    }

    #[test]
    fn test_load_config_validates_after_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "path = \"shadow\"\n").unwrap();

        let global = GlobalArgs {
            config: Some(path),
            ..Default::default()
        };

        let err = load_config(&global).unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err), ExitCode::ConfigError);
    }
}
