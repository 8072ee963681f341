pub mod configuration;
pub mod controller;
pub mod engine;

#[cfg(test)]
pub(crate) mod testing;
