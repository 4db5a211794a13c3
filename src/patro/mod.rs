pub mod audit;
pub mod config;
pub mod fetch;
#[cfg(test)]
pub mod fixtures;
pub mod index;
pub mod months;
pub mod parse;
pub mod paths;
pub mod record;
pub mod resolve;
pub mod rules;
pub mod store;
pub mod sync;
pub mod util;
pub mod warn;
