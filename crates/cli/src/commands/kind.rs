//! kind command - Print the backend kind of the configured storage

use rstore_core::RemoteStorage as _;

use super::{GlobalArgs, finish, open_storage};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Execute the kind command
pub async fn execute(global: &GlobalArgs) -> ExitCode {
    let formatter = Formatter::new(global.output_config());
    let storage = match open_storage(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let kind = storage.kind();
    if formatter.is_json() {
        formatter.json(&serde_json::json!({
            "kind": kind,
            "bucket": storage.bucket(),
        }));
    } else {
        formatter.println(kind);
    }

    finish(storage, ExitCode::Success).await
}
