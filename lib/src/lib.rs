pub mod constants;
pub mod crypto;
pub mod error;
pub mod group;
pub mod identifiers;
pub mod util;
pub mod wire;
