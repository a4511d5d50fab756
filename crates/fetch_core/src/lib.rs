//! Request plumbing for the listings client.
//!
//! Two layers: a typed executor ([`TypedClient`]) that performs one network
//! call and encodes every outcome, cancellation included, as a value; and the
//! abortable controllers ([`AbortableFetch`], [`AbortableSearch`]) that own
//! at most one in-flight operation each, supersede stale work, and publish a
//! consistent state snapshot over a watch channel.
//!
//! No request deadline is enforced anywhere in this crate: an operation that
//! neither resolves nor gets cancelled stays pending until it is superseded.
//! Controllers spawn onto the ambient tokio runtime and must be used inside
//! one.

pub mod abortable;
pub mod client;
pub mod search;
pub mod typed_fetch;

pub use abortable::{AbortableFetch, FetchState};
pub use client::{ListingsClient, MAX_SEARCH_RESULTS};
pub use search::{AbortableSearch, SearchMetrics, SearchState, DEFAULT_DEBOUNCE};
pub use typed_fetch::{FetchError, FetchResult, TypedClient};

#[cfg(test)]
mod tests;
