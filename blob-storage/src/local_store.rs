use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::fs;
use crate::addressing::name_for;
use crate::store::{BlobResult, BlobStore};

/// Stores each blob as one file under `base_path`, named by [`name_for`]
/// so the caller's id never reaches the filesystem.
#[derive(Clone, Debug)]
pub struct LocalFileBlobStore {
    base_path: PathBuf,
}

impl LocalFileBlobStore {
    /// Creates the store, making `base_path` if it does not exist yet.
    pub fn new(base_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.base_path.join(name_for(id))
    }
}

#[async_trait]
impl BlobStore for LocalFileBlobStore {
    async fn save(&self, id: &str, data: &[u8]) -> BlobResult<()> {
        // truncates an existing file; uniqueness is checked one layer up
        fs::write(self.path_for(id), data).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn read_raw(path: &Path) -> Vec<u8> {
        let mut file = File::open(path).unwrap();
        let mut file_data = Vec::new();
        file.read_to_end(&mut file_data).unwrap();
        file_data
    }

    #[tokio::test]
    async fn test_save_writes_hashed_filename() {
        let temp_dir = tempdir().unwrap();
        let blob_store = LocalFileBlobStore::new(temp_dir.path()).unwrap();

        blob_store.save("a1", b"test data").await.unwrap();

        let file_path = temp_dir.path().join(name_for("a1"));
        assert_eq!(read_raw(&file_path), b"test data");
        assert!(!temp_dir.path().join("a1").exists());
    }

    #[tokio::test]
    async fn test_save_overwrite() {
        let temp_dir = tempdir().unwrap();
        let blob_store = LocalFileBlobStore::new(temp_dir.path()).unwrap();
        let id = Uuid::new_v4().to_string();

        blob_store.save(&id, b"test data 1").await.unwrap();
        blob_store.save(&id, b"test data 2").await.unwrap();

        assert_eq!(read_raw(&blob_store.path_for(&id)), b"test data 2");
    }

    #[tokio::test]
    async fn test_round_trip_with_hostile_ids() {
        let temp_dir = tempdir().unwrap();
        let blob_store = LocalFileBlobStore::new(temp_dir.path()).unwrap();

        for id in ["../../escape", "/etc/passwd", "con", "a/b/c", ""] {
            let data = format!("payload for {id}").into_bytes();
            blob_store.save(id, &data).await.unwrap();
            assert_eq!(blob_store.get(id).await.unwrap(), Some(data));
        }
        // nothing escaped the base directory
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 5);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let temp_dir = tempdir().unwrap();
        let blob_store = LocalFileBlobStore::new(temp_dir.path()).unwrap();

        assert_eq!(blob_store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_existing_and_missing() {
        let temp_dir = tempdir().unwrap();
        let blob_store = LocalFileBlobStore::new(temp_dir.path()).unwrap();

        blob_store.save("gone", b"bytes").await.unwrap();
        blob_store.delete("gone").await.unwrap();
        assert_eq!(blob_store.get("gone").await.unwrap(), None);

        blob_store.delete("never-there").await.unwrap();
    }

    #[tokio::test]
    async fn test_new_creates_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("nested").join("blobs");
        let blob_store = LocalFileBlobStore::new(&nested).unwrap();

        assert!(nested.is_dir());
        blob_store.save("x", b"").await.unwrap();
        assert_eq!(blob_store.get("x").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_get_on_unreadable_entry_is_error() {
        let temp_dir = tempdir().unwrap();
        let blob_store = LocalFileBlobStore::new(temp_dir.path()).unwrap();
        // a directory where the blob file should be cannot be read as bytes
        std::fs::create_dir(blob_store.path_for("dir")).unwrap();

        assert!(blob_store.get("dir").await.is_err());
        assert!(blob_store.delete("dir").await.is_err());
    }
}
