//! Provides an infrastructure to create processing nodes, connect nodes
//! together via crossbeam channels, and start nodes running in their own
//! independent threads.
//!
//! # Example
//!
//! ```
//! #[macro_use] extern crate imu_filter_rs;
//! use imu_filter_rs::prelude::*;
//!
//! # fn main() {
//! struct Source {
//!     count: u32,
//!     sender: NodeSender<u32>,
//! }
//!
//! impl Node for Source {
//!     fn call(&mut self) -> Result<(), NodeError> {
//!         if self.count == 0 {
//!             return Err(NodeError::PermanentError);
//!         }
//!         self.count -= 1;
//!         for send in &self.sender {
//!             send.send(self.count).map_err(|_| NodeError::CommError)?;
//!         }
//!         Ok(())
//!     }
//!
//!     fn is_connected(&self) -> bool {
//!         true
//!     }
//! }
//!
//! struct Sink {
//!     input: NodeReceiver<u32>,
//! }
//!
//! let mut source = Source { count: 3, sender: vec![] };
//! let mut sink = Sink { input: None };
//!
//! // source will now send its messages to sink, which receives them on the
//! // receiver named `input`.
//! connect_nodes!(source, sender, sink, input);
//! let handles = start_nodes!(source);
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! let received: Vec<u32> = sink.input.unwrap().iter().collect();
//! assert_eq!(received, vec![2, 1, 0]);
//! # }
//! ```

use std::error;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum NodeError {
    CommError,
    PermanentError,
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let desc = match *self {
            NodeError::CommError => "Channel peer disconnected",
            NodeError::PermanentError => "Node is not connected",
        };
        write!(f, "Node error: {}", desc)
    }
}

impl error::Error for NodeError {
    fn cause(&self) -> Option<&dyn error::Error> {
        None
    }
}

/// The trait that all nodes in the library implement.
///
/// `call` executes one unit of work. Nodes are driven by `start`, which keeps
/// calling until the node reports an error, usually because one of its peers
/// hung up.
pub trait Node: Send {
    fn call(&mut self) -> Result<(), NodeError>;

    fn is_connected(&self) -> bool;

    fn start(&mut self) {
        loop {
            if let Err(e) = self.call() {
                debug!("node stopped: {}", e);
                break;
            }
        }
    }
}

/// Connects two nodes together with crossbeam channels.
///
/// The sending field must be a `NodeSender<T>` and the receiving field a
/// `NodeReceiver<T>`, which may sit in a nested field such as
/// `inputs.accel.receiver`. Channels are unbounded.
#[macro_export]
macro_rules! connect_nodes {
    ($n1:ident, $send:ident, $n2:ident, $($recv:ident).+) => {{
        let (send, recv) = $crate::channel::unbounded();
        $n1.$send.push(send);
        $n2$(.$recv)+ = Some(recv);
    }};
}

/// Spawns a thread for each node in order and runs each node until it stops.
/// Evaluates to the join handles of the spawned threads.
#[macro_export]
macro_rules! start_nodes {
    ($($node:ident),+ $(,)*) => {{
        let mut handles = Vec::new();
        $(
            handles.push(::std::thread::spawn(move || {
                $crate::node::Node::start(&mut $node);
            }));
        )*
        handles
    }};
}
