//! Execution module - Streaming attempts, case runs, model runs
//!
//! Everything here runs strictly sequentially. Cancellation is cooperative:
//! it is checked before each case, before each run, and once per streamed
//! chunk.

mod bench;
mod messages;
mod probe;
mod runner;
mod stream;

pub use bench::*;
pub use messages::*;
pub use probe::*;
pub use runner::*;
pub use stream::*;
