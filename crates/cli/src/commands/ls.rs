//! ls command - List objects and prefixes
//!
//! Non-recursive listings group keys by `/`; recursive listings show every
//! object under the path.

use clap::Args;
use rstore_core::{RemoteFile, RemoteStorage as _};
use serde::Serialize;

use super::{GlobalArgs, finish, open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// List objects and prefixes
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Path relative to the configured root
    #[arg(default_value = "")]
    pub path: String,

    /// List every object below the path instead of grouping by prefix
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<RemoteFile>,
    total_objects: usize,
    total_size_bytes: u64,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());
    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let mut items = Vec::new();
    let result = if formatter.is_json() {
        storage
            .walk(&args.path, args.recursive, &mut |file| {
                items.push(file);
                Ok(())
            })
            .await
    } else {
        storage
            .walk(&args.path, args.recursive, &mut |file| {
                formatter.println(&format_line(&formatter, &file));
                Ok(())
            })
            .await
    };

    let code = match result {
        Ok(()) => {
            if formatter.is_json() {
                let objects = items.iter().filter(|f| !f.is_dir());
                let output = LsOutput {
                    total_objects: objects.clone().count(),
                    total_size_bytes: objects.map(RemoteFile::size).sum(),
                    items,
                };
                formatter.json(&output);
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, "Failed to list objects", &e),
    };

    finish(storage, code).await
}

/// `[date] size name`, with prefixes shown as directories
fn format_line(formatter: &Formatter, file: &RemoteFile) -> String {
    let date = formatter.style_date(&format!("[{}]", formatter.format_timestamp(file.last_modified())));
    if file.is_dir() {
        format!("{date} {:>10} {}", "PRE", formatter.style_dir(file.name()))
    } else {
        let size = formatter.style_size(&format!("{:>10}", formatter.format_size(file.size())));
        format!("{date} {size} {}", file.name())
    }
}
