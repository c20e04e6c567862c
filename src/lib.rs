extern crate crossbeam;
#[macro_use]
extern crate log;

#[macro_use]
pub mod node;
pub mod config;
pub mod cycle;
pub mod filter;
pub mod prelude;
pub mod util;

pub use crossbeam::channel::{self, Receiver, Sender};
