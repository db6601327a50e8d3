use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::next_id;
use crate::{
    api::PinAPI,
    entities::{seed_pins, NewPin, Pin},
    error::{not_found_error, storage_error, Error},
};

/// Pin collection kept in a single JSON document on disk.
///
/// Every mutation reads the whole document and writes it back. There is no
/// locking, so concurrent writers race and the last write wins.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    pins: Vec<Pin>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing has been persisted yet.
    async fn read(&self) -> Result<Option<Document>, Error> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let document = serde_json::from_slice(&bytes).map_err(storage_error)?;

        Ok(Some(document))
    }

    async fn write(&self, document: &Document) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(document)?;
        fs::write(&self.path, bytes).await?;

        Ok(())
    }

    async fn load(&self) -> Result<Document, Error> {
        self.initialize().await?;

        Ok(self.read().await?.unwrap_or_default())
    }
}

#[async_trait]
impl PinAPI for FileStore {
    #[tracing::instrument(skip(self))]
    async fn initialize(&self) -> Result<(), Error> {
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        self.write(&Document { pins: seed_pins() }).await?;

        tracing::info!("pin file initialized with sample pins");

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_pins(&self) -> Result<Vec<Pin>, Error> {
        Ok(self.load().await?.pins)
    }

    #[tracing::instrument(skip(self))]
    async fn create_pin(&self, pin: NewPin) -> Result<Pin, Error> {
        let mut document = self.load().await?;

        let id = next_id(document.pins.iter().map(|pin| pin.id))?;
        let pin = pin.into_pin(id);

        document.pins.push(pin.clone());
        self.write(&document).await?;

        Ok(pin)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_pin(&self, id: u64) -> Result<(), Error> {
        let mut document = self.load().await?;

        let index = document
            .pins
            .iter()
            .position(|pin| pin.id == id)
            .ok_or_else(not_found_error)?;

        document.pins.remove(index);
        self.write(&document).await?;

        Ok(())
    }
}

#[cfg(test)]
fn here() -> crate::entities::Coordinates {
    crate::entities::Coordinates { lat: 1.0, lng: 2.0 }
}

#[cfg(test)]
fn new_pin(name: &str) -> NewPin {
    NewPin::new(Some(name.into()), Some(here()), None).unwrap()
}

#[test]
fn seeds_missing_file_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("data").join("pins.json"));

    assert_eq!(block_on(store.list_pins()).unwrap(), seed_pins());
    assert!(store.path().exists());

    block_on(store.initialize()).unwrap();
    assert_eq!(block_on(store.list_pins()).unwrap().len(), 3);
}

#[test]
fn create_in_empty_store_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pins.json");
    std::fs::write(&path, r#"{"pins": []}"#).unwrap();
    let store = FileStore::new(&path);

    let pin = block_on(store.create_pin(new_pin("X"))).unwrap();

    assert_eq!(
        serde_json::to_value(&pin).unwrap(),
        serde_json::json!({"id": 1, "name": "X", "location": [1.0, 2.0], "description": ""})
    );
    assert_eq!(block_on(store.list_pins()).unwrap(), vec![pin]);
}

#[test]
fn create_assigns_max_plus_one_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pins.json");
    std::fs::write(
        &path,
        r#"{"pins": [
            {"id": 9, "name": "a", "location": [0, 0]},
            {"id": 4, "name": "b", "location": [0, 0]}
        ]}"#,
    )
    .unwrap();
    let store = FileStore::new(&path);

    assert_eq!(block_on(store.create_pin(new_pin("c"))).unwrap().id, 10);
    assert_eq!(block_on(store.create_pin(new_pin("d"))).unwrap().id, 11);
}

#[test]
fn creates_are_listed_with_seeds_test() {
    use std::collections::HashSet;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("pins.json"));

    for i in 0..5 {
        block_on(store.create_pin(new_pin(&format!("pin {}", i)))).unwrap();
    }

    let pins = block_on(store.list_pins()).unwrap();
    let ids: HashSet<u64> = pins.iter().map(|pin| pin.id).collect();

    assert_eq!(pins.len(), 3 + 5);
    assert_eq!(ids.len(), pins.len());
    assert_eq!(ids, (1..=8).collect());
}

#[test]
fn delete_removes_only_target_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("pins.json"));

    block_on(store.delete_pin(2)).unwrap();

    let ids: Vec<u64> = block_on(store.list_pins())
        .unwrap()
        .iter()
        .map(|pin| pin.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn delete_missing_is_not_found_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("pins.json"));
    block_on(store.initialize()).unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let err = block_on(store.delete_pin(42)).unwrap_err();

    assert!(err.is_not_found_error());
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[test]
fn exhausted_ids_are_storage_error_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pins.json");
    let contents = format!(
        r#"{{"pins": [{{"id": {}, "name": "a", "location": [0, 0]}}]}}"#,
        u64::MAX
    );
    std::fs::write(&path, &contents).unwrap();
    let store = FileStore::new(&path);

    let err = block_on(store.create_pin(new_pin("b"))).unwrap_err();

    assert!(err.is_storage_error());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
}

#[test]
fn corrupt_file_is_storage_error_test() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pins.json");
    std::fs::write(&path, "not json").unwrap();
    let store = FileStore::new(&path);

    assert!(block_on(store.list_pins()).unwrap_err().is_storage_error());
    assert!(block_on(store.create_pin(new_pin("X")))
        .unwrap_err()
        .is_storage_error());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
}
