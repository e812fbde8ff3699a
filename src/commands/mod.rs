pub mod align;
pub mod blocks;
