mod hex_error;
mod interpretation;
mod nogood;
mod nogood_set;

pub use hex_error::*;
pub use interpretation::*;
pub use nogood::*;
pub use nogood_set::*;
