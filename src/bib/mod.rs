pub mod hash;
pub mod loader;
pub mod model;
pub mod parser;
