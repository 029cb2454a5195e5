//! Reactive markup binding engine.
//!
//! Mounts on a container element, scans it once for declarations, and keeps
//! an in-memory key/value store synchronized with the markup:
//! state writes re-render bound elements → computations re-run →
//! delegated events run handlers, inline expressions or HTTP calls, which
//! write state again.
//!
//! The markup tree is reached through [`MarkupHost`] (see
//! [`MemoryDocument`]) and the network through [`Transport`].

pub mod actions;
pub mod calc;
pub mod codec;
pub mod config;
pub mod dom;
pub mod element;
pub mod error;
pub mod expr;
pub mod host;
pub mod persist;
pub mod store;
pub mod transport;

mod dispatch;
mod registry;

pub use actions::{Action, Actions, Handler, Templates};
pub use calc::{CalcGraph, Trigger};
pub use config::{HttpConfig, RippleConfig};
pub use dom::MemoryDocument;
pub use element::{Content, Element};
pub use error::{Result, RippleError};
pub use host::{Event, MarkupHost, NodeId, Position};
pub use persist::{FileStorage, MemoryStorage, Persistence, Storage};
pub use store::{Lookup, Ripple, RippleBuilder, Selection, Store};
pub use transport::{HttpRequest, HttpResponse, Transport, Verb};
