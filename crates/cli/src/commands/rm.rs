//! rm command - Delete an object from the primary or object-disk root

use clap::Args;
use rstore_core::RemoteStorage as _;
use serde::Serialize;

use super::{GlobalArgs, finish, open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Delete an object
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object path relative to the root
    pub path: String,

    /// Resolve the path against object_disk_path instead of path
    #[arg(long)]
    pub object_disk: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    deleted: String,
    object_disk: bool,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());
    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = if args.object_disk {
        storage.delete_file_from_object_disk_backup(&args.path).await
    } else {
        storage.delete_file(&args.path).await
    };

    let code = match result {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&RmOutput {
                    deleted: args.path.clone(),
                    object_disk: args.object_disk,
                });
            } else {
                formatter.success(&format!("Removed {}", args.path));
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, &format!("Failed to remove {}", args.path), &e),
    };

    finish(storage, code).await
}
