#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod abi;
mod backend;
mod config;
mod create;
mod detail;
mod encryption;
mod error;
mod format;
mod gateway;
mod list;
mod mem;
mod relayer;
mod router;
mod rpc;
mod session;
mod voting;
mod wallet;

pub use abi::*;
pub use backend::*;
pub use config::*;
pub use create::*;
pub use detail::*;
pub use encryption::*;
pub use error::*;
pub use format::*;
pub use gateway::*;
pub use list::*;
pub use mem::*;
pub use relayer::*;
pub use router::*;
pub use rpc::*;
pub use session::*;
pub use voting::*;
pub use wallet::*;

#[cfg(test)]
mod tests;
