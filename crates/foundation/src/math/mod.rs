mod geodesy;

pub use geodesy::*;
