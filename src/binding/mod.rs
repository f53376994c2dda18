//! Object binding: exposing host objects to page scripts.
//!
//! # Submodules
//!
//! - [`registry`] - Object registration and the script-side binding surface
//! - [`method_runner`] - Sequential or concurrent dispatch of async method calls
//! - [`sync_channel`] - Close path of the synchronous binding channel

pub mod method_runner;
pub mod registry;
pub mod sync_channel;

pub use method_runner::{DispatchMode, MethodRunnerQueue, PendingCall};
pub use registry::{
    BindResult, BindingHelper, BindingOptions, BoundObjectInfo, Member, ObjectRegistry,
    ScriptContext,
};
pub use sync_channel::{AbortReason, ChannelHost, CloseOutcome, InProcessChannelHost, SyncBindingHost};
