//! Services shared by every client: the local store handle and the
//! offline-first note repository built on it.

mod local_store;
mod repository;

pub use local_store::LocalStore;
pub use repository::OfflineNoteRepository;
