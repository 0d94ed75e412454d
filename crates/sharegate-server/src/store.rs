//! Shared handle to the SQLite database.

use std::path::Path;
use std::sync::{Arc, Mutex};

use sharegate_store::{Database, StoreError};

use crate::error::ServerError;

/// A connection shared by the handlers of one process.
///
/// The mutex only serializes use of the connection; cross-request and
/// cross-process exclusivity comes from conditional writes in the store.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run a store operation. The lock is never held across an await.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StoreError>,
    ) -> Result<T, ServerError> {
        let db = self
            .db
            .lock()
            .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
        f(&db).map_err(ServerError::from)
    }
}
