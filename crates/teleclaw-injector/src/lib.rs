//! teleclaw-injector — keystroke delivery into the assistant's pane.
//!
//! The injector owns the hardest contract in the relay: type a command into
//! a live tmux pane as if the operator were at the keyboard, then watch the
//! pane and answer whatever confirmation prompts the assistant raises. Two
//! delivery backends implement the same trait: the tmux injector and a
//! drop-folder fallback for hosts without a multiplexer.

pub mod backend;
pub mod classify;
pub mod driver;
pub mod dropdir;
pub mod error;
pub mod injector;
pub mod tmux;

pub use backend::DeliveryBackend;
pub use classify::{classify, PromptClass};
pub use driver::PaneDriver;
pub use dropdir::DropFolderBackend;
pub use error::{InjectorError, Result};
pub use injector::PaneInjector;
pub use tmux::TmuxDriver;
