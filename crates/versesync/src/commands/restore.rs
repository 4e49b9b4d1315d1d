use crate::commands::{display_name, CmdMessage, CmdResult};
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::store::LocalLibrary;

/// Overwrites every local collection with the remote blob. No merge.
///
/// Destructive: the caller is responsible for having confirmed with the user.
/// When the remote holds no blob, local data is left alone.
pub fn run(engine: &mut SyncEngine, library: &LocalLibrary) -> Result<CmdResult> {
    let remote = engine.restore()?;
    let label = display_name(engine.current_adapter());
    let mut result = CmdResult::default();

    let Some(blob) = remote else {
        result.add_message(CmdMessage::warning(format!(
            "No sync data on {label}, local data left untouched"
        )));
        return Ok(result);
    };

    library.replace_all(&blob)?;
    let stats = blob.stats();
    result.add_message(CmdMessage::success(format!(
        "Restored from {label}: {stats}"
    )));
    Ok(result.with_stats(stats))
}
