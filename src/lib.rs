pub use pixelforge_core::*;

pub mod imaging {
    pub use pixelforge_imaging::*;
}

pub mod studio {
    pub use pixelforge_studio::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use pixelforge_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use pixelforge_client::*;
}

#[cfg(feature = "fs")]
pub mod fs {
    pub use pixelforge_fs::*;
}

#[cfg(feature = "s3")]
pub mod s3 {
    pub use pixelforge_s3::*;
}

#[cfg(feature = "openai")]
pub mod openai {
    pub use pixelforge_openai::*;
}

#[cfg(feature = "mock")]
pub mod mock {
    pub use pixelforge_mock::*;
}

pub mod prelude {
    pub use pixelforge_core::prelude::*;
    pub use pixelforge_studio::{AssetStore, StorageBackend, Studio, StudioConfig};

    #[cfg(feature = "server")]
    pub use pixelforge_server::prelude::*;

    #[cfg(feature = "client")]
    pub use pixelforge_client::PixelforgeClient;

    #[cfg(feature = "fs")]
    pub use pixelforge_fs::{FileSystemRepository, FileSystemStorage};

    #[cfg(feature = "s3")]
    pub use pixelforge_s3::S3Storage;

    #[cfg(feature = "openai")]
    pub use pixelforge_openai::{OpenAiConfig, OpenAiProvider};

    #[cfg(feature = "mock")]
    pub use pixelforge_mock::{MemoryRepository, MemoryStorage, ScriptedProvider};
}
