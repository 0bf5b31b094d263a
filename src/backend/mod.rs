//! Backend abstraction layer
//!
//! The engine talks to the GPU only through [`GraphicsBackend`]. Device and
//! swap chain creation live behind that trait; [`dummy::DummyBackend`] is the
//! headless implementation used by tests and the demo.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::{
    CommandStream, DrawState, DummyBackend, DummyTimeline, QueueEvent, RecordedCommand,
    TimelineMode,
};
pub use traits::*;
pub use types::*;
