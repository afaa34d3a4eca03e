pub mod batch;
pub mod community;
pub mod generation;
pub mod image;

pub use batch::*;
pub use community::CommunityWork;
pub use generation::*;
pub use image::*;
