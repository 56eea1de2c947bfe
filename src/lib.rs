//! medgate - feature access and usage quota gate for the medical reference tools
//!
//! Tool pages ask the gate whether a session may use a feature, then report
//! each use. Quotas come from a static policy per access level; counters
//! live in a usage store and reset every window.

pub mod access;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod observability;
pub mod store;

pub use access::{
    AccessDecision, AccessLevel, Feature, FeatureAccessGate, QuotaPolicy, QuotaRule, QuotaWindow,
    SessionContext,
};
