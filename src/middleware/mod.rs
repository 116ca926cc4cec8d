pub mod auth;
pub mod metrics;
pub mod validation;

pub use self::auth::*;
pub use self::metrics::*;
pub use self::validation::*;
