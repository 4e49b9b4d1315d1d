use crate::commands::{display_name, CmdMessage, CmdResult};
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::session::SessionFile;

/// Authenticates the active backend, selecting `name` first when given.
///
/// This is the only command that may prompt (folder picker, browser consent).
pub fn run(engine: &mut SyncEngine, session: &SessionFile, name: Option<&str>) -> Result<CmdResult> {
    if let Some(name) = name {
        engine.set_adapter(name)?;
    }
    let active = engine
        .current_adapter()
        .map(|a| a.name().to_string())
        .ok_or(SyncError::NoAdapterSelected)?;

    let mut result = CmdResult::default();
    let label = display_name(engine.current_adapter());

    if !engine.authenticate()? {
        result.add_message(CmdMessage::warning(format!(
            "Connection to {label} was cancelled"
        )));
        return Ok(result);
    }

    session.update(|s| {
        if s.active_adapter.as_deref() != Some(active.as_str()) {
            s.last_synced = None;
        }
        s.active_adapter = Some(active.clone());
    })?;

    result.add_message(CmdMessage::success(format!("Connected to {label}")));
    let location = engine
        .current_adapter()
        .and_then(|a| a.display_metadata())
        .and_then(|m| m.location());
    if let Some(location) = location {
        result.add_message(CmdMessage::info(format!("Sync data lives in {location}")));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::CmdFixture;

    #[test]
    fn connect_selects_authenticates_and_persists() {
        let mut fx = CmdFixture::new();
        let result = run(&mut fx.engine, &fx.session, Some("mem")).unwrap();

        assert!(fx.engine.is_authenticated());
        assert_eq!(fx.session.load().active_adapter.as_deref(), Some("mem"));
        assert!(result.messages[0].content.contains("Connected"));
    }

    #[test]
    fn connect_without_selection_fails() {
        let mut fx = CmdFixture::new();
        assert!(matches!(
            run(&mut fx.engine, &fx.session, None),
            Err(SyncError::NoAdapterSelected)
        ));
    }

    #[test]
    fn refused_grant_is_reported_not_persisted() {
        let mut fx = CmdFixture::new();
        fx.remote.refuse_grant(true);
        let result = run(&mut fx.engine, &fx.session, Some("mem")).unwrap();

        assert!(!fx.engine.is_authenticated());
        assert!(result.messages[0].content.contains("cancelled"));
        assert_eq!(fx.session.load().active_adapter, None);
    }
}
