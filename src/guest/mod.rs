//! Guest process spawning, combined output stream, and stdin plumbing.

mod input;
mod process;
mod stream;

pub use input::*;
pub use process::*;
pub use stream::*;
