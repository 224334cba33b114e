//! The simulation resolution core.
//!
//! - [`matchers`]: the registry of matcher kinds
//! - [`field_matcher`]: OR within an attribute, AND across keyed values
//! - [`request`]: matching a whole pair, including state preconditions
//! - [`strategy`]: `first`/`strongest` selection and closest-miss
//! - [`cache`]: fingerprint-keyed memo of matching outcomes

mod array;
pub mod cache;
pub mod field_matcher;
mod json;
pub mod matchers;
pub mod request;
pub mod strategy;
mod xml;

pub use cache::{CacheError, CachedResponse, CachedResponseView, ResultCache, ResultCacheConfig};
pub use matchers::{CompiledMatcher, MatcherError, MatcherKind};
pub use request::{CompiledRequestMatcher, PairMatch};
pub use strategy::{select, MatchResult, MatchingStrategy};
