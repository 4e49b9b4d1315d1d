use super::{upsert, EntityStore, Record};
use crate::error::{Result, SyncError};
use std::cell::{Cell, RefCell};

/// In-memory store for tests.
///
/// `RefCell` keeps the `&self` signatures of [`EntityStore`] in a
/// single-threaded setting.
pub struct MemStore<T> {
    records: RefCell<Vec<T>>,
    simulate_write_error: Cell<bool>,
}

impl<T> Default for MemStore<T> {
    fn default() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
            simulate_write_error: Cell::new(false),
        }
    }
}

impl<T: Record> MemStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<T>) -> Self {
        let store = Self::new();
        upsert(&mut store.records.borrow_mut(), records);
        store
    }

    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(SyncError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl<T: Record> EntityStore<T> for MemStore<T> {
    fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.records.borrow().clone())
    }

    fn put(&self, record: T) -> Result<()> {
        self.import_records(vec![record])
    }

    fn clear(&self) -> Result<()> {
        self.check_writable()?;
        self.records.borrow_mut().clear();
        Ok(())
    }

    fn import_records(&self, records: Vec<T>) -> Result<()> {
        self.check_writable()?;
        upsert(&mut self.records.borrow_mut(), records);
        Ok(())
    }
}
