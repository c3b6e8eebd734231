//! memora-engine: the streaming conversation engine
//!
//! Folds backend reply streams into the open conversation's message list,
//! keeps the ordered conversation registry, and groups it by recency for
//! navigation. [`ChatSession`] ties these together behind one `&mut` API.

pub mod auth;
pub mod bucket;
pub mod chat;
pub mod error;
pub mod events;
pub mod handle;
pub mod reconciler;
pub mod registry;

pub use auth::AuthGate;
pub use bucket::{RecencyBucket, RecencyLabel, bucket};
pub use chat::ChatSession;
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use handle::SessionHandle;
pub use reconciler::{MessageReconciler, ReconcilerState};
pub use registry::{ConversationRegistry, TITLE_MAX_CHARS, derive_title};
