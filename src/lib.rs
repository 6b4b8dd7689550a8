//! chatcmd — chat messages in, command executions out.
//!
//! Inbound messages are matched against an ordered rule list; the first
//! matching rule's command runs under a timeout with message context in
//! its environment, and the command's output becomes the reply.

pub mod channels;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod interpret;
pub mod rules;
pub mod runner;
