//! Dispatch bridge
//!
//! [`DispatchBridge`] turns an accepted call into a scheduled Baton;
//! [`CompletionDispatcher`] turns a finished Baton into exactly one callback
//! invocation. Both run on the callback thread and are driven by
//! [`EventLoop`](crate::EventLoop).

mod completion;
mod submit;

pub use completion::CompletionDispatcher;
pub use submit::DispatchBridge;
