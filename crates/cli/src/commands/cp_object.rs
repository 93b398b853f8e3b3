//! cp-object command - Server-side copy into the object-disk root

use clap::Args;
use rstore_core::RemoteStorage as _;
use serde::Serialize;

use super::{GlobalArgs, finish, open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Server-side copy into the object-disk root
#[derive(Args, Debug)]
pub struct CpObjectArgs {
    /// Bucket holding the source object
    pub src_bucket: String,

    /// Full key of the source object (not rebased on any root)
    pub src_key: String,

    /// Destination path relative to object_disk_path
    pub dst: String,
}

#[derive(Debug, Serialize)]
struct CopyOutput {
    source: String,
    target: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the cp-object command
pub async fn execute(args: CpObjectArgs, global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());
    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let source = format!("{}/{}", args.src_bucket, args.src_key);
    let code = match storage
        .copy_object(&args.src_bucket, &args.src_key, &args.dst)
        .await
    {
        Ok(size) => {
            let output = CopyOutput {
                source,
                target: args.dst.clone(),
                size_bytes: size,
                size_human: formatter.format_size(size),
            };
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                formatter.success(&format!(
                    "{} -> {} ({})",
                    output.source,
                    output.target,
                    formatter.style_size(&output.size_human)
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, &format!("Failed to copy {source}"), &e),
    };

    finish(storage, code).await
}
