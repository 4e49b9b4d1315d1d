use crate::commands::{AdapterInfo, CmdResult};
use crate::engine::SyncEngine;
use crate::error::Result;

/// Lists registered backends in registration order.
pub fn run(engine: &SyncEngine) -> Result<CmdResult> {
    let active = engine.current_adapter().map(|a| a.name().to_string());
    let adapters = engine
        .available_adapters()
        .iter()
        .filter_map(|name| engine.adapter(name))
        .map(|adapter| AdapterInfo::describe(adapter, active.as_deref() == Some(adapter.name())))
        .collect();
    Ok(CmdResult::default().with_adapters(adapters))
}
