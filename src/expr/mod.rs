pub mod csc;
pub mod dense;
pub mod normalize;
