pub mod operator;
pub mod probe;
pub mod session;
pub mod timer;
pub mod transport;
