use crate::commands::{display_name, CmdMessage, CmdResult};
use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::Result;
use crate::session::SessionFile;
use crate::store::LocalLibrary;

/// Merges local data with the remote and writes the result to both sides.
///
/// Local stores are only written after the remote save succeeded. When the
/// merge finds conflicts neither side is written and the conflicts are
/// returned for the UI to show.
pub fn run(
    engine: &mut SyncEngine,
    library: &LocalLibrary,
    session: &SessionFile,
) -> Result<CmdResult> {
    let local = library.snapshot()?;
    let outcome = engine.sync(&local)?;
    let label = display_name(engine.current_adapter());
    let mut result = CmdResult::default();

    match outcome {
        SyncOutcome::Synced {
            last_synced,
            merged,
            first_sync,
        } => {
            library.apply(&merged)?;
            session.update(|s| s.last_synced = Some(last_synced))?;

            let stats = merged.stats();
            if first_sync {
                result.add_message(CmdMessage::info(format!(
                    "No sync data on {label} yet, created it"
                )));
            }
            result.add_message(CmdMessage::success(format!(
                "Synced with {label}: {stats}"
            )));
            Ok(result.with_stats(stats))
        }
        SyncOutcome::Conflicts { conflicts } => {
            result.add_message(CmdMessage::warning(format!(
                "{} conflict(s) need attention, nothing was written",
                conflicts.len()
            )));
            Ok(result.with_conflicts(conflicts))
        }
    }
}
