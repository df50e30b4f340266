mod cancel;
mod error;
mod model;
mod transport;

pub use cancel::CancelToken;
pub use error::{SyncError, TransportError};
pub use model::{
    content_eq, ContentMeta, FileState, Index, RelPath, RemoteFileMeta, Source,
    INDEX_SCHEMA_VERSION,
};
pub use transport::{GetFileOutcome, RemoteListing, Transport};
