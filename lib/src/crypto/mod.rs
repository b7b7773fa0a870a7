pub mod certificates;
pub mod envelope;
pub mod key_exchange;
pub mod keys;
pub mod pem;
pub mod rng;
