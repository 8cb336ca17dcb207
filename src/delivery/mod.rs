//! Delivery of notes to the downstream sink.

mod misskey;

pub use misskey::MisskeyClient;

use async_trait::async_trait;

use crate::note::Note;
use crate::Result;

/// Posts one note.
///
/// Errors are not classified; the caller leaves the entry undelivered and
/// retries on the next pass.
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn post(&self, note: &Note) -> Result<()>;
}
