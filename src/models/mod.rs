pub mod analysis;
pub mod gemini;
pub mod usage;

pub use analysis::*;
pub use gemini::*;
pub use usage::*;
