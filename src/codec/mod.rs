pub mod geo;
pub mod process;
pub mod uplink;

pub use process::{aggregate, evaluate, is_degraded, process, DownlinkFormat};
pub use uplink::decode_uplink;
