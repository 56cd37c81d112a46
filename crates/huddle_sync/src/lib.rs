//! huddle_sync
//!
//! Client-side synchronization engine for the huddle workspace. Keeps
//! cached views of collaboratively edited data consistent with a remote
//! store that other users mutate concurrently, without refetch storms and
//! without leaking subscriptions.
//!
//! The engine is intentionally UI-framework-agnostic: a front end calls
//! [`SyncEngine::activate`] / [`SyncEngine::deactivate`] from whatever
//! mount/unmount mechanism it has, reads [`SyncEngine::snapshot`] whenever
//! the [`SyncEngine::changed`] watch ticks, and consumes
//! [`SyncEngine::notifications`] for user-facing outcomes.
//!
//! Pieces:
//!
//! - [`cache::CacheStore`]: pure reference-counted entry store with
//!   stale-while-revalidate and stale-while-error semantics.
//! - Fetch executor (`SyncEngine::run` / `SyncEngine::refetch`): at most
//!   one concurrent fetch per identity, generation-guarded completions,
//!   per-entity-set staleness TTLs.
//! - Invalidation coalescer: change events debounce through an explicit
//!   scheduled-invalidation table ([`DEBOUNCE_WINDOW`]); chat inserts are
//!   appended in place instead.
//! - Mutation dispatcher ([`SyncEngine::execute`]): targeted invalidation
//!   on success, notifications either way, no cache writes on failure.
//! - Subscription lifecycle manager: one descriptor per scope, epoch-based
//!   cancellation-on-arrival, ref-counted cache eviction on unmount.
//!
//! The remote service is consumed through the [`RemoteAccessPort`] trait;
//! the engine is generic over it the way a networking layer is generic
//! over its transport provider.

pub mod cache;
mod coalesce;
mod engine;
mod fetch;
mod lifecycle;
mod mutation;
pub mod port;
pub mod registry;
pub mod scope;

pub use coalesce::DEBOUNCE_WINDOW;
pub use engine::{QuerySnapshot, SyncEngine};
pub use port::{
    AuthIdentity, ChangeFilter, ChangeSubscription, MutationOp, RemoteAccessPort,
};
pub use scope::{Scope, ScopeKind};
