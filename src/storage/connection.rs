/*!
 * SQLite connection handle for the key/value store.
 *
 * One connection per database file, shared behind a mutex. Every access
 * goes through `with_conn`, which holds the mutex for the duration of the
 * closure; statements from different threads never interleave.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::schema;
use crate::errors::StorageError;

const DB_FILENAME: &str = "msgtranslate.db";
const DB_DIRNAME: &str = "msgtranslate";

/// How long a statement waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct DatabaseConnection {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open the database under the platform data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Open or create the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening database at: {:?}", path);
        let conn = Connection::open(&path).with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::prepare(path, conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::prepare(PathBuf::from(":memory:"), conn)
    }

    fn prepare(path: PathBuf, conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set database busy timeout")?;
        schema::initialize_schema(&conn)?;
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// `<data dir>/msgtranslate/msgtranslate.db`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .ok_or_else(|| anyhow!("Could not determine a data directory for the database"))?;
        Ok(base.join(DB_DIRNAME).join(DB_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive use of the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }
}
