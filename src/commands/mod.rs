//! Commands: identity, execution boundary and macro whitelist.

mod command;
mod service;
mod whitelist;

pub use command::{CommandParseError, ParameterizedCommand};
pub use service::{
    execute_command, handler_fn, CommandService, ExecutionOutcome, FnHandler, Handler,
    HandlerService, NotExecutedReason,
};
pub use whitelist::CommandWhitelist;
