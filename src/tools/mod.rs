//! Tool invocation layer.
//!
//! A tool is addressed by a dotted name (`properties.search`) and takes a
//! JSON argument object; it answers with text, usually JSON. The executor
//! only sees the [`ToolInvoker`] trait. Two implementations ship here:
//!
//! - [`ToolRegistry`]: in-process async closures keyed by tool name.
//! - [`HttpToolInvoker`]: posts each call to a remote tool server.

pub mod http;
pub mod invoker;
pub mod registry;

pub use http::{HttpToolInvoker, DEFAULT_TOOLS_URL, TOOLS_URL_ENV};
pub use invoker::{ToolError, ToolInvoker};
pub use registry::{ToolFn, ToolRegistry};
