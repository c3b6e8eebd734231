//! memora-client: wire layer for the Memora backend
//!
//! This crate decodes the chunked `text/event-stream` reply of a message send
//! into typed events, and provides the backend collaborators (conversation
//! CRUD, streaming send, auth) as traits with an HTTP implementation.

pub mod backend;
pub mod error;
pub mod sse;
pub mod stream;
pub mod types;

pub use backend::{AuthBackend, ConversationBackend, MessageStreamer, http::HttpBackend};
pub use error::{DecodeError, Error, Result};
pub use sse::FrameDecoder;
pub use stream::{StreamEvent, StreamEventStream, decode_events, parse_frame};
pub use types::*;
