//! State and rendering core for a file-vault tree browser.
//!
//! Load a tree with [`source::load_tree`], wrap it in a [`session::Explorer`],
//! feed it user intents and draw the [`render_tree::ViewModel`] it projects.

pub mod config;
pub mod enrich;
pub mod error;
pub mod expand_state;
pub mod navigation;
pub mod render_tree;
pub mod search;
pub mod session;
pub mod source;
pub mod tree;
pub mod validate;

pub use error::{LoadError, ValidationError};
pub use navigation::{Intent, Mode, NavKey, NavState};
pub use render_tree::ViewModel;
pub use session::{Explorer, Session};
pub use tree::VaultTree;
