//! Streaming chat gateway over Gemini and OpenAI.
//!
//! Every provider is driven through an adapter that turns the vendor's
//! streaming protocol into [`ragway_protocol::StreamFrame`]s. OpenAI
//! assistants additionally need vendor-side resources (assistant, vector
//! store, thread), managed by [`openai::ResourceManager`].

pub mod adapter;
pub mod dispatcher;
pub mod gemini;
pub mod http;
pub mod keys;
pub mod openai;
pub mod prompts;
pub mod types;

pub use adapter::{Adapter, FrameStream, VendorStream};
pub use dispatcher::{dispatch, route, Dispatcher, Route, Vendors};
pub use types::*;
