//! Bottega core: optimistic mutation and cache consistency for the
//! storefront client.
//!
//! The crate owns the client-side state shared between storefront views:
//! the shopping cart and the support-chat thread. User actions are applied
//! optimistically to a process-wide [`cache::QueryCache`], committed
//! against a remote [`remote::StoreClient`], and rolled back to an exact
//! snapshot when the commit fails. The [`mutation::MutationCoordinator`]
//! serializes conflicting mutations per cache key and guarantees a final
//! settlement step on every exit path.
//!
//! UI rendering, routing, and the HTTP transport are host concerns; they
//! reach this crate only through the `remote` and `session` traits and the
//! read-only views exposed by the `application` services.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod mutation;
pub mod remote;
pub mod session;

pub use application::cart::{CartService, CartView};
pub use application::chat::{ChatService, ChatView};
pub use cache::{CacheEntry, CacheValue, QueryCache, QueryKey, QueryStatus, Subscription};
pub use config::CoreConfig;
pub use mutation::{MutationCoordinator, MutationDescriptor, MutationError};
pub use remote::{RemoteError, RemoteErrorKind, ServerResult, StoreClient};
pub use session::DurableStore;
