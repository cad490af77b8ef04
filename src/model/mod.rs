pub mod downlink;
pub mod fix;
pub mod frames;
pub mod gateway;
pub mod lorawan;
pub mod report;
