pub mod messages;
pub mod provision;
pub mod synthesis;

pub use messages::*;
pub use provision::*;
pub use synthesis::*;
