use crate::commands::{display_name, CmdMessage, CmdResult};
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::session::SessionFile;

/// Clears the selection. With `forget`, stored credentials are deleted too.
/// Remote data is never touched.
pub fn run(engine: &mut SyncEngine, session: &SessionFile, forget: bool) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if engine.current_adapter().is_none() {
        result.add_message(CmdMessage::info("No sync backend selected"));
        return Ok(result);
    }

    let label = display_name(engine.current_adapter());
    if forget {
        engine.sign_out()?;
    } else {
        engine.disconnect();
    }
    session.update(|s| {
        s.active_adapter = None;
        s.last_synced = None;
    })?;

    result.add_message(CmdMessage::success(format!("Disconnected from {label}")));
    if forget {
        result.add_message(CmdMessage::info("Stored credentials were removed"));
    }
    Ok(result)
}
