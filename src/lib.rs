pub mod aggregator;
pub mod config;
pub mod constants;
pub mod derivation;
pub mod error;
pub mod model;
pub mod node;
pub mod reconciler;
pub mod trytes;

#[cfg(test)]
pub(crate) mod test_utils;
