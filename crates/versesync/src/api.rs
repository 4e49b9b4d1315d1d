//! # API Facade
//!
//! [`SyncApi`] is the single entry point for UI clients. It owns the engine,
//! the local library and the session file, and dispatches to the command
//! layer.
//!
//! The facade holds no logic of its own: it does not print, prompt or format.
//! Everything it returns is a [`CmdResult`](commands::CmdResult).
//!
//! ## Testing Strategy
//!
//! API tests check that each method reaches its command and that state
//! (selection, library) flows between calls. Command behavior is tested in
//! the command modules.

use crate::commands;
use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::session::SessionFile;
use crate::store::LocalLibrary;

pub struct SyncApi {
    engine: SyncEngine,
    library: LocalLibrary,
    session: SessionFile,
    config: SyncConfig,
}

impl SyncApi {
    pub fn new(
        engine: SyncEngine,
        library: LocalLibrary,
        session: SessionFile,
        config: SyncConfig,
    ) -> Self {
        Self {
            engine,
            library,
            session,
            config,
        }
    }

    pub fn adapters(&self) -> Result<commands::CmdResult> {
        commands::adapters::run(&self.engine)
    }

    pub fn use_adapter(&mut self, name: &str) -> Result<commands::CmdResult> {
        commands::select::run(&mut self.engine, &self.session, name)
    }

    pub fn connect(&mut self, name: Option<&str>) -> Result<commands::CmdResult> {
        commands::connect::run(&mut self.engine, &self.session, name)
    }

    pub fn status(&mut self, check_remote: bool) -> Result<commands::CmdResult> {
        commands::status::run(&mut self.engine, &self.library, &self.session, check_remote)
    }

    pub fn sync(&mut self) -> Result<commands::CmdResult> {
        commands::sync::run(&mut self.engine, &self.library, &self.session)
    }

    /// Destructive, see [`commands::restore::run`].
    pub fn restore(&mut self) -> Result<commands::CmdResult> {
        commands::restore::run(&mut self.engine, &self.library)
    }

    pub fn disconnect(&mut self, forget: bool) -> Result<commands::CmdResult> {
        commands::disconnect::run(&mut self.engine, &self.session, forget)
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn library(&self) -> &LocalLibrary {
        &self.library
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
