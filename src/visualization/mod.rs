pub mod snapshot;
#[cfg(feature = "vis")]
pub mod quad_vis2d;
