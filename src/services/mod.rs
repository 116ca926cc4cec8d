pub mod extractor;
pub mod gemini;
pub mod metrics;
pub mod quota_manager;
pub mod redis;
pub mod usage_store;

pub use self::extractor::*;
pub use self::gemini::*;
pub use self::metrics::*;
pub use self::quota_manager::*;
pub use self::redis::*;
pub use self::usage_store::*;
