//! Library crate for portscan-sim: a simulated port scanner with a static
//! port knowledge base, export formats and a local scan history.
pub mod export;
pub mod history;
pub mod ports;
pub mod results;
pub mod scanner;
pub mod server;
pub mod simulator;
pub mod types;
pub mod validate;
