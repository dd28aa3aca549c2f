pub mod discovery;
pub mod ports;
pub mod registry;
pub mod serial;
pub mod traits;
