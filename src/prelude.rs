//! This module provides an easy single import for those using this crate.

pub use crate::node::Node;
pub use crate::node::NodeError;
pub use crossbeam::channel::{self, Receiver, Sender};
pub use std::thread;

pub type NodeReceiver<T> = Option<Receiver<T>>;
pub type NodeSender<T> = Vec<Sender<T>>;

/// A three axis sensor vector in body frame.
pub type Vector3 = [f32; 3];
