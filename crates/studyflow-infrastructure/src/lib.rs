//! StudyFlow infrastructure: durable local storage, retry queue, and the
//! remote endpoint boundary.

pub mod blob_store;
pub mod durable_queue;
pub mod memory;
pub mod remote;

pub use blob_store::{BlobStore, FileBlobStore, InMemoryBlobStore, UnavailableBlobStore};
pub use durable_queue::{DurableQueue, QUEUE_KEY};
pub use memory::{InMemoryResponseRepository, InMemorySessionRepository};
pub use remote::{HttpRemoteEndpoint, RemoteEndpoint};
