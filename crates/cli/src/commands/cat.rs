//! cat command - Stream an object to stdout

use clap::Args;
use rstore_core::RemoteStorage as _;
use tokio::io::AsyncWriteExt;

use super::{GlobalArgs, finish, open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Stream an object to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object path relative to the configured root
    pub path: String,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());
    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let code = match storage.get_file_reader(&args.path).await {
        Ok(mut reader) => {
            let mut stdout = tokio::io::stdout();
            let copied = match tokio::io::copy(&mut reader, &mut stdout).await {
                Ok(_) => stdout.flush().await,
                Err(e) => Err(e),
            };
            match copied {
                Ok(()) => ExitCode::Success,
                Err(e) => {
                    formatter.error(&format!("Failed to read {}: {e}", args.path));
                    ExitCode::NetworkError
                }
            }
        }
        Err(e) => report(&formatter, &format!("Failed to open {}", args.path), &e),
    };

    finish(storage, code).await
}
