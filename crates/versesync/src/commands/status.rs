use crate::commands::{AdapterInfo, CmdMessage, CmdResult, StatusReport};
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::session::SessionFile;
use crate::store::LocalLibrary;

/// Reports the active backend, connection state and local record counts.
///
/// With `check_remote`, `last_synced` is read from the remote blob instead of
/// the session cache, which costs a load. A lapsed grant is resumed silently
/// first.
pub fn run(
    engine: &mut SyncEngine,
    library: &LocalLibrary,
    session: &SessionFile,
    check_remote: bool,
) -> Result<CmdResult> {
    let local = library.snapshot()?.stats();
    let mut result = CmdResult::default();
    let mut last_synced = session.load().last_synced;
    let mut remote_checked = false;

    if check_remote && engine.current_adapter().is_some() {
        match engine.last_sync_time() {
            Ok(remote) => {
                last_synced = remote;
                remote_checked = true;
            }
            Err(SyncError::NotAuthenticated) => {
                result.add_message(CmdMessage::warning("Access was lost, run connect again"));
            }
            Err(e) => result.add_message(CmdMessage::warning(format!(
                "Could not read remote: {e}"
            ))),
        }
    }

    let report = StatusReport {
        adapter: engine
            .current_adapter()
            .map(|a| AdapterInfo::describe(a, true)),
        state: engine.state(),
        last_synced,
        remote_checked,
        local,
    };
    Ok(result.with_status(report))
}
