//! I/O: the transport abstraction, its reqwest implementation and the attempt
//! controller that drives it.

mod controller;
mod transport;

#[cfg(feature = "reqwest")]
mod http;

pub use controller::AttemptController;
pub use transport::Transport;

#[cfg(feature = "reqwest")]
pub use http::{ReqwestTransport, TransportConfig};
