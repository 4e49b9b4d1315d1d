use crate::commands::{display_name, CmdMessage, CmdResult};
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::session::SessionFile;
use tracing::debug;

/// Makes `name` the active backend and remembers the choice.
///
/// A stored grant is picked up silently; nothing here prompts.
pub fn run(engine: &mut SyncEngine, session: &SessionFile, name: &str) -> Result<CmdResult> {
    engine.set_adapter(name)?;
    session.update(|s| {
        if s.active_adapter.as_deref() != Some(name) {
            s.last_synced = None;
        }
        s.active_adapter = Some(name.to_string());
    })?;

    let resumed = match engine.resume() {
        Ok(resumed) => resumed,
        Err(e) => {
            debug!(error = %e, "could not resume stored grant");
            false
        }
    };

    let mut result = CmdResult::default();
    let label = display_name(engine.current_adapter());
    if resumed {
        result.add_message(CmdMessage::success(format!("Using {label} (connected)")));
    } else {
        result.add_message(CmdMessage::success(format!("Using {label}")));
        result.add_message(CmdMessage::info("Not connected yet, run connect to sign in"));
    }
    Ok(result)
}
