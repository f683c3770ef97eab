pub mod capacity;
pub mod decode;
pub mod encode;
pub mod keygen;
pub mod status;

pub use capacity::*;
pub use decode::*;
pub use encode::*;
pub use keygen::*;
pub use status::*;
