pub mod classify;
pub mod error;
pub mod history;
pub mod model;
pub mod palette;
pub mod preferences;
pub mod traits;

pub mod prelude {
    pub use super::classify::*;
    pub use super::error::*;
    pub use super::history::*;
    pub use super::model::*;
    pub use super::palette::*;
    pub use super::preferences::*;
    pub use super::traits::*;
}
