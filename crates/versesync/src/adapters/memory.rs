use super::{SupportsDisplayMetadata, SyncAdapter};
use crate::error::{Result, SyncError};
use crate::model::SyncBlob;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct MemRemote {
    blob: Option<SyncBlob>,
    revision: u64,
    saves: usize,
    loads: usize,
    revoked: bool,
    refuse_grant: bool,
    fail_load: bool,
    fail_save: bool,
    write_after_load: Option<SyncBlob>,
}

/// In-memory adapter for testing.
///
/// The "remote" lives behind an `Rc<RefCell<..>>` so a test can keep a
/// [`MemRemoteHandle`] after the adapter has been moved into an engine.
pub struct MemAdapter {
    name: String,
    authenticated: bool,
    remote: Rc<RefCell<MemRemote>>,
}

impl MemAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            authenticated: false,
            remote: Rc::new(RefCell::new(MemRemote::default())),
        }
    }

    /// Two adapters sharing one remote, like two devices on one account.
    pub fn sharing(name: &str, other: &MemAdapter) -> Self {
        Self {
            name: name.to_string(),
            authenticated: false,
            remote: Rc::clone(&other.remote),
        }
    }

    pub fn handle(&self) -> MemRemoteHandle {
        MemRemoteHandle {
            remote: Rc::clone(&self.remote),
        }
    }

    fn check_grant(&mut self) -> Result<()> {
        if self.remote.borrow().revoked {
            self.authenticated = false;
        }
        if self.authenticated {
            Ok(())
        } else {
            Err(SyncError::NotAuthenticated)
        }
    }
}

impl SyncAdapter for MemAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated && !self.remote.borrow().revoked
    }

    fn authenticate(&mut self) -> Result<bool> {
        let remote = self.remote.borrow();
        self.authenticated = !remote.refuse_grant && !remote.revoked;
        Ok(self.authenticated)
    }

    fn load_data(&mut self) -> Result<Option<SyncBlob>> {
        self.check_grant()?;
        let mut remote = self.remote.borrow_mut();
        if remote.fail_load {
            return Err(SyncError::backend(&self.name, "Simulated read error"));
        }
        remote.loads += 1;
        let blob = remote.blob.clone();
        if let Some(concurrent) = remote.write_after_load.take() {
            remote.blob = Some(concurrent);
            remote.revision += 1;
        }
        Ok(blob)
    }

    fn save_data(&mut self, blob: &SyncBlob) -> Result<()> {
        self.check_grant()?;
        let mut remote = self.remote.borrow_mut();
        if remote.fail_save {
            return Err(SyncError::backend(&self.name, "Simulated write error"));
        }
        remote.saves += 1;
        if remote.blob.as_ref() != Some(blob) {
            remote.blob = Some(blob.clone());
            remote.revision += 1;
        }
        Ok(())
    }

    fn revision(&mut self) -> Result<Option<String>> {
        self.check_grant()?;
        let remote = self.remote.borrow();
        Ok(remote.blob.as_ref().map(|_| remote.revision.to_string()))
    }

    fn forget(&mut self) {
        self.authenticated = false;
    }

    fn display_metadata(&self) -> Option<&dyn SupportsDisplayMetadata> {
        Some(self)
    }
}

impl SupportsDisplayMetadata for MemAdapter {
    fn display_name(&self) -> String {
        format!("In-memory ({})", self.name)
    }

    fn location(&self) -> Option<String> {
        None
    }
}

/// Test-side view of a [`MemAdapter`]'s remote.
#[derive(Clone)]
pub struct MemRemoteHandle {
    remote: Rc<RefCell<MemRemote>>,
}

impl MemRemoteHandle {
    pub fn blob(&self) -> Option<SyncBlob> {
        self.remote.borrow().blob.clone()
    }

    pub fn set_blob(&self, blob: SyncBlob) {
        let mut remote = self.remote.borrow_mut();
        remote.blob = Some(blob);
        remote.revision += 1;
    }

    pub fn save_count(&self) -> usize {
        self.remote.borrow().saves
    }

    pub fn load_count(&self) -> usize {
        self.remote.borrow().loads
    }

    /// Simulates the user revoking access mid-session.
    pub fn revoke(&self) {
        self.remote.borrow_mut().revoked = true;
    }

    pub fn refuse_grant(&self, refuse: bool) {
        self.remote.borrow_mut().refuse_grant = refuse;
    }

    pub fn set_simulate_load_error(&self, fail: bool) {
        self.remote.borrow_mut().fail_load = fail;
    }

    pub fn set_simulate_save_error(&self, fail: bool) {
        self.remote.borrow_mut().fail_save = fail;
    }

    /// Another client writes `blob` right after the next load.
    pub fn write_after_next_load(&self, blob: SyncBlob) {
        self.remote.borrow_mut().write_after_load = Some(blob);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_authentication() {
        let mut adapter = MemAdapter::new("mem");
        assert!(matches!(adapter.load_data(), Err(SyncError::NotAuthenticated)));
        assert!(adapter.authenticate().unwrap());
        assert!(adapter.load_data().unwrap().is_none());
    }

    #[test]
    fn identical_saves_do_not_bump_revision() {
        let mut adapter = MemAdapter::new("mem");
        adapter.authenticate().unwrap();
        adapter.save_data(&SyncBlob::empty()).unwrap();
        let first = adapter.revision().unwrap();
        adapter.save_data(&SyncBlob::empty()).unwrap();
        assert_eq!(adapter.revision().unwrap(), first);
        assert_eq!(adapter.handle().save_count(), 2);
    }

    #[test]
    fn revoke_drops_authentication() {
        let mut adapter = MemAdapter::new("mem");
        adapter.authenticate().unwrap();
        adapter.handle().revoke();
        assert!(!adapter.is_authenticated());
        assert!(matches!(
            adapter.save_data(&SyncBlob::empty()),
            Err(SyncError::NotAuthenticated)
        ));
    }

    #[test]
    fn sharing_adapters_see_the_same_remote() {
        let mut a = MemAdapter::new("a");
        let mut b = MemAdapter::sharing("b", &a);
        a.authenticate().unwrap();
        b.authenticate().unwrap();
        a.save_data(&SyncBlob::empty()).unwrap();
        assert_eq!(b.load_data().unwrap(), Some(SyncBlob::empty()));
    }
}
