//! External collaborators: storage and the crypto worker pool.
//!
//! Both are shared process-wide behind `Arc<dyn Trait>` so startup can wire
//! real drivers and tests can substitute recording doubles.

pub mod crypto;
pub mod storage;

pub use crypto::{BcryptPool, CryptoError, CryptoPool};
pub use storage::{MemoryStorage, Storage, StorageError, TcpStorage};
