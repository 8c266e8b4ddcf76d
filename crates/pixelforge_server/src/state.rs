use pixelforge_core::traits::{
    ArtifactRepository, BlobStore, ImageProvider, PaletteRepository, PreferencesRepository,
};
use pixelforge_studio::Studio;

#[derive(Clone)]
pub struct AppState<L, R, D, P>
where
    L: BlobStore,
    R: BlobStore,
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
    P: ImageProvider,
{
    pub studio: Studio<L, R, D, P>,
    /// Preferences owner; the service has no user accounts.
    pub user_id: String,
}
