pub mod config;
pub mod history;
pub mod sweep;
pub mod version;

pub use config::*;
pub use history::*;
pub use sweep::*;
pub use version::*;
