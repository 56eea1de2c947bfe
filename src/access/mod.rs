//! # Feature Access
//!
//! Per-session feature gating and usage quotas for the tool pages.
//!
//! ## Components
//!
//! - `feature`: Gated features and access levels
//! - `policy`: Quota rules per (level, feature) and reset windows
//! - `session`: Caller identity passed into every check
//! - `decision`: Check results as returned to tool pages
//! - `gate`: Check, increment and atomic consume
//! - `clock`: Time source
//! - `errors`: Gate errors

pub mod clock;
pub mod decision;
pub mod errors;
pub mod feature;
pub mod gate;
pub mod policy;
pub mod session;

pub use clock::*;
pub use decision::*;
pub use errors::*;
pub use feature::*;
pub use gate::*;
pub use policy::*;
pub use session::*;
