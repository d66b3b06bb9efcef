pub mod assignment;
pub mod constants;
pub mod game;
pub mod instrument;
pub mod order_timer;
pub mod persist;
pub mod position;

pub use assignment::*;
pub use game::*;
pub use instrument::*;
pub use order_timer::*;
pub use persist::*;
pub use position::*;
