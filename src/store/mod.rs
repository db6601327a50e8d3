mod file;
mod firebase;

pub use file::FileStore;
pub use firebase::FirebaseStore;

use std::sync::Arc;

use crate::api::DynAPI;
use crate::config::StoreConfig;
use crate::error::{storage_error, Error};

/// Builds the backend selected by `config`.
pub fn open(config: &StoreConfig) -> Result<DynAPI, Error> {
    let api = match config {
        StoreConfig::File { path } => {
            tracing::info!(path = %path.display(), "using file pin store");
            Arc::new(FileStore::new(path.clone())) as DynAPI
        }
        StoreConfig::Firebase { url, auth_token } => {
            tracing::info!(%url, "using firebase pin store");
            Arc::new(FirebaseStore::new(url, auth_token.clone())?) as DynAPI
        }
    };

    Ok(api)
}

/// One past the largest id, or 1 for an empty collection.
pub(crate) fn next_id<I>(ids: I) -> Result<u64, Error>
where
    I: IntoIterator<Item = u64>,
{
    match ids.into_iter().max() {
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| storage_error(format!("pin id space exhausted after {}", max))),
        None => Ok(1),
    }
}

#[test]
fn next_id_test() {
    assert_eq!(next_id(Vec::new()).unwrap(), 1);
    assert_eq!(next_id(vec![1, 2, 3]).unwrap(), 4);
    assert_eq!(next_id(vec![7, 2]).unwrap(), 8);
}

#[test]
fn next_id_overflow_test() {
    let err = next_id(vec![3, u64::MAX]).unwrap_err();

    assert!(err.is_storage_error());
    assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn open_file_store_test() {
    use crate::api::PinAPI;
    use crate::entities::seed_pins;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let api = open(&StoreConfig::File {
        path: dir.path().join("pins.json"),
    })
    .unwrap();

    assert_eq!(block_on(api.list_pins()).unwrap(), seed_pins());
}
