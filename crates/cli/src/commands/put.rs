//! put command - Upload a local file

use std::path::PathBuf;

use clap::Args;
use rstore_core::RemoteStorage as _;
use serde::Serialize;

use super::{GlobalArgs, finish, open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Upload a local file
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub local: PathBuf,

    /// Destination path relative to the configured root
    pub remote: String,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    local: String,
    remote: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the put command
pub async fn execute(args: PutArgs, global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());

    let mut file = match tokio::fs::File::open(&args.local).await {
        Ok(f) => f,
        Err(e) => {
            formatter.error(&format!("Cannot open {}: {e}", args.local.display()));
            return ExitCode::UsageError;
        }
    };
    let size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            formatter.error(&format!("Cannot stat {}: {e}", args.local.display()));
            return ExitCode::UsageError;
        }
    };

    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let code = match storage.put_file(&args.remote, &mut file).await {
        Ok(()) => {
            let size_human = formatter.format_size(size);
            if formatter.is_json() {
                formatter.json(&PutOutput {
                    local: args.local.display().to_string(),
                    remote: args.remote.clone(),
                    size_bytes: size,
                    size_human,
                });
            } else {
                formatter.success(&format!(
                    "{} -> {} ({})",
                    args.local.display(),
                    args.remote,
                    formatter.style_size(&size_human)
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, &format!("Failed to upload {}", args.remote), &e),
    };

    finish(storage, code).await
}
