//! # Pixelforge Studio
//!
//! The workflows of the pixelforge service, independent of HTTP and of any
//! concrete backend:
//!
//! * **Generation** from a text prompt.
//! * **Upload processing**, locally or through the image provider.
//! * **Revision**: describe the current image, classify the instruction,
//!   edit, quantize, store, archive the previous version and persist. The
//!   stored artifact only changes once every step has succeeded.
//!
//! Backends are plugged in through the traits of `pixelforge_core`.

pub mod assets;
pub mod prompts;
mod studio;

pub use assets::{AssetStore, EncodedAsset, StorageBackend, StoredAsset};
pub use studio::{
    GenerateRequest, Revision, RevisionRequest, Studio, StudioConfig, UPLOAD_EXTENSIONS,
    UploadRequest,
};
