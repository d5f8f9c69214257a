pub mod contribution;
pub mod input;
pub mod member;
pub mod score;
pub mod snapshot;
pub mod weights;
