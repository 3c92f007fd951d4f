mod address;
mod batch;
mod bitmap;

pub use address::{parse_ipv4, MAX_ADDRESS_LEN};
#[cfg(test)]
pub use address::{index_to_ipv4, ipv4_to_index};
pub use batch::{Batch, LineBatch};
pub use bitmap::PresenceSet;
