pub mod digits;
pub mod mask;
pub mod normalize;
pub mod roi;
