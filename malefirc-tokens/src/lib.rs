//! IRC protocol tokens.
//!
//! This crate provides the wire-level building blocks of the malefirc
//! server:
//!
//! - `Message` and `Tag`, borrowed views over a received IRC line,
//! - `Buffer` and friends, to build outgoing IRC lines,
//! - `Command`, the set of known commands with their parameter counts,
//! - `rpl`, the numeric replies used by the server,
//! - `mode`, parsing of MODE queries.
//!
//! Messages built with `Buffer` parse back to the same tags, prefix,
//! command and parameters, as long as middle parameters carry no
//! whitespace and trailing parameters carry no CR/LF.

#![warn(clippy::all, rust_2018_idioms)]

pub use crate::buffers::{Buffer, MessageBuffer, ReplyBuffer, TagBuffer};
pub use crate::command::Command;
pub use crate::message::{tag_escape, tags, Message, Tag, MESSAGE_LENGTH, PARAMS_LENGTH};

mod buffers;
mod command;
mod message;
pub mod mode;
pub mod rpl;
