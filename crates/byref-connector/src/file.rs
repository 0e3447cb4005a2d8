use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use byref_types::ObjectId;

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::Connector;

/// Filesystem-backed connector: one file per object, named by the id's
/// hex form, inside a configured directory.
///
/// Any process that can reach the directory (node-local or shared
/// filesystem) can reconstruct an equivalent connector from
/// [`ConnectorConfig::File`]. Writes go to a temporary file in the same
/// directory and are renamed into place, so a concurrent reader never
/// observes a partial payload.
pub struct FileConnector {
    dir: PathBuf,
}

impl FileConnector {
    /// Open a connector over the given directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> ConnectorResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the stored objects.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.dir.join(id.to_hex())
    }
}

impl Connector for FileConnector {
    fn put(&self, id: &ObjectId, data: &[u8]) -> ConnectorResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.object_path(id))
            .map_err(|e| ConnectorError::Io(e.error))?;
        debug!(id = %id.short_hex(), len = data.len(), "file put");
        Ok(())
    }

    fn get(&self, id: &ObjectId) -> ConnectorResult<Vec<u8>> {
        match fs::read(self.object_path(id)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConnectorError::NotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    fn evict(&self, id: &ObjectId) -> ConnectorResult<()> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(()),
            // Already gone counts as success: evict is idempotent and may
            // race another evictor.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, id: &ObjectId) -> ConnectorResult<bool> {
        match fs::metadata(self.object_path(id)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn config(&self) -> ConnectorConfig {
        ConnectorConfig::File {
            dir: self.dir.clone(),
        }
    }

    fn close(&self) -> ConnectorResult<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for FileConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConnector").field("dir", &self.dir).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_connector() -> (tempfile::TempDir, FileConnector) {
        let dir = tempfile::tempdir().unwrap();
        let conn = FileConnector::open(dir.path().join("objects")).unwrap();
        (dir, conn)
    }

    #[test]
    fn put_and_get() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"file payload").unwrap();
        assert_eq!(conn.get(&id).unwrap(), b"file payload");
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, conn) = temp_connector();
        assert!(matches!(
            conn.get(&ObjectId::random()),
            Err(ConnectorError::NotFound(_))
        ));
    }

    #[test]
    fn object_file_is_named_by_hex() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"named").unwrap();
        assert!(conn.dir().join(id.to_hex()).is_file());
    }

    #[test]
    fn put_same_id_overwrites_cleanly() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"first").unwrap();
        conn.put(&id, b"first").unwrap();
        assert_eq!(conn.get(&id).unwrap(), b"first");
    }

    #[test]
    fn evict_removes_the_file() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"x").unwrap();
        conn.evict(&id).unwrap();
        assert!(!conn.exists(&id).unwrap());
        assert!(matches!(conn.get(&id), Err(ConnectorError::NotFound(_))));
    }

    #[test]
    fn double_evict_is_a_noop() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"x").unwrap();
        conn.evict(&id).unwrap();
        conn.evict(&id).unwrap();
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"payload").unwrap();
        let entries: Vec<_> = fs::read_dir(conn.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn config_reconstructs_over_same_directory() {
        let (_dir, conn) = temp_connector();
        let id = ObjectId::random();
        conn.put(&id, b"shared via fs").unwrap();

        // A second connector built from the first one's config sees the
        // same objects, as a remote process on a shared mount would.
        let rebuilt = conn.config().connect().unwrap();
        assert_eq!(rebuilt.get(&id).unwrap(), b"shared via fs");
    }

    #[test]
    fn close_removes_the_directory() {
        let (_dir, conn) = temp_connector();
        conn.put(&ObjectId::random(), b"x").unwrap();
        conn.close().unwrap();
        assert!(!conn.dir().exists());
        // Closing twice tolerates the missing directory.
        conn.close().unwrap();
    }

    #[test]
    fn concurrent_writers_distinct_ids() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let conn = Arc::new(FileConnector::open(dir.path().join("objects")).unwrap());

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let conn = Arc::clone(&conn);
                thread::spawn(move || {
                    let id = ObjectId::of_content(&[i]);
                    conn.put(&id, &[i; 64]).unwrap();
                    assert_eq!(conn.get(&id).unwrap(), vec![i; 64]);
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }
}
