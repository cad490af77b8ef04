pub mod chirpstack;
pub mod common;
pub mod mqtt;
pub mod raw;
pub mod ttn;
