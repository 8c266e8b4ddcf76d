//! # Pixelforge Server
//!
//! The HTTP API of pixelforge, built on axum. Handlers validate input and
//! delegate to a [`pixelforge_studio::Studio`]; errors are rendered as
//! `{ "error": ..., "code": ... }` with a status derived from
//! [`pixelforge_core::error::ForgeError`].
//!
//! ```no_run
//! # use pixelforge_server::prelude::*;
//! # fn run<L, R, D, P>(studio: pixelforge_studio::Studio<L, R, D, P>)
//! # where
//! #     L: pixelforge_core::traits::BlobStore,
//! #     R: pixelforge_core::traits::BlobStore,
//! #     D: pixelforge_core::traits::ArtifactRepository
//! #         + pixelforge_core::traits::PreferencesRepository
//! #         + pixelforge_core::traits::PaletteRepository,
//! #     P: pixelforge_core::traits::ImageProvider,
//! # {
//! let app = PixelforgeServer::default().build(studio);
//! # }
//! ```

mod api;
pub mod config;
mod server;
pub mod state;

pub use api::{ApiError, ApiResult};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::server::*;
    pub use crate::state::*;
}
