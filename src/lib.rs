#[macro_use]
pub mod macros;

pub mod constraints;
pub mod env;
pub mod error;
pub mod frame;
pub mod fs;
pub mod logging;
pub mod merge;
pub mod state;
pub mod ty;
pub mod unify;
pub mod utils;
pub mod value;
