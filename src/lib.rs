//! SLIRC Bouncer library.
//!
//! The upstream half of an IRC bouncer: one persistent connection per
//! account, multiplexed across any number of attached downstream clients.

pub mod backend;
pub mod backlog;
pub mod client;
pub mod config;
pub mod logging;
pub mod message;
pub mod protocol;
pub mod push;
pub mod session;
pub mod validation;


pub use backlog::{Backlog, SharedBacklog};
pub use client::ClientHandle;
pub use message::IrcMessage;
pub use session::{Host, Session, SessionHandle};
