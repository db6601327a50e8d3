use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::{NewPin, Pin};
use crate::error::Error;

/// Storage operations over the pin collection.
///
/// Every operation initializes the collection first, so callers never need to
/// seed explicitly.
#[async_trait]
pub trait PinAPI {
    /// Seeds the collection with the sample pins if nothing is persisted yet.
    async fn initialize(&self) -> Result<(), Error>;

    async fn list_pins(&self) -> Result<Vec<Pin>, Error>;

    /// Assigns the next id (max existing id + 1, or 1) and persists the pin.
    async fn create_pin(&self, pin: NewPin) -> Result<Pin, Error>;

    async fn delete_pin(&self, id: u64) -> Result<(), Error>;
}

pub type DynAPI = Arc<dyn PinAPI + Send + Sync>;
