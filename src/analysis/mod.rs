pub mod aggregate;
pub mod breakdown;
pub mod cap;
pub mod formulas;
pub mod normalize;
pub mod snapshot;
pub mod weights;
