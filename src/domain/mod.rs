pub mod assets;
pub mod types;

pub use assets::*;
pub use types::*;
