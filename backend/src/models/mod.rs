pub mod flux;
pub mod station;
pub mod window;

pub use flux::*;
pub use station::*;
pub use window::*;
