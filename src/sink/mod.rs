// Message sinks: delivery targets for rendered posts.

pub mod console;
pub mod registry;
pub mod traits;
pub mod webhook;

pub use registry::SinkRegistry;
pub use traits::{MessageSink, SendError};
