//! Handler descriptors and everything attached to them.
//!
//! - [`HandlerDescriptor`]: a registration bound to one plugin instance
//! - [`ScopeFlags`] / [`AllowList`]: who may trigger a message handler
//! - [`HandlerResponse`] / [`Reply`]: how handler return values become replies

mod descriptor;
mod response;
mod scope;

pub(crate) use descriptor::{BoundCallable, BoundMessageFn, BoundWebhookFn, PreparedCall};
pub use descriptor::{Doc, Execution, HandlerDescriptor, Invocation, PluginRef, Trigger};
pub use response::{HandlerResponse, Reply};
pub use scope::{AllowList, ScopeFlags};
