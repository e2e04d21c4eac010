#[macro_use]
extern crate tracing;

pub mod backend;
pub mod layout_demand;
pub mod output;
pub mod protocols;
pub mod root;
pub mod script;
pub mod transaction;
pub mod utils;
pub mod view;

#[cfg(test)]
mod tests;
