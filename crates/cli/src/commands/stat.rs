//! stat command - Show object size and modification time

use clap::Args;
use rstore_core::RemoteStorage as _;
use serde::Serialize;

use super::{GlobalArgs, finish, open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Show object size and modification time
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object path relative to the configured root
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    name: String,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());
    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let code = match storage.stat_file(&args.path).await {
        Ok(file) => {
            let output = StatOutput {
                name: file.name().to_string(),
                size_bytes: file.size(),
                size_human: formatter.format_size(file.size()),
                last_modified: file.last_modified().map(|ts| ts.to_string()),
            };

            if formatter.is_json() {
                formatter.json(&output);
            } else {
                let modified = formatter.format_timestamp(file.last_modified());
                formatter.println(&format!("{} {}", formatter.style_key("Name    :"), output.name));
                formatter.println(&format!(
                    "{} {} ({} bytes)",
                    formatter.style_key("Size    :"),
                    formatter.style_size(&output.size_human),
                    output.size_bytes
                ));
                formatter.println(&format!(
                    "{} {}",
                    formatter.style_key("Modified:"),
                    formatter.style_date(&modified)
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, &format!("Failed to stat {}", args.path), &e),
    };

    finish(storage, code).await
}
