pub mod serde;
pub mod stats;
