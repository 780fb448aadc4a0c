pub mod physics;
pub mod stats;

#[cfg(test)]
mod tests;

pub use physics::*;
pub use stats::*;
