pub mod fs_blob;
pub mod identity;
pub mod offline;
pub mod pg_documents;

pub use fs_blob::FsBlobStore;
pub use identity::{NoIdentityProvider, PgIdentityProvider};
pub use offline::OfflineDocumentDb;
pub use pg_documents::PgDocumentDb;
