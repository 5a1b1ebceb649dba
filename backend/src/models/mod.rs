pub mod coordinates;
pub mod site;

pub use coordinates::*;
pub use site::*;
