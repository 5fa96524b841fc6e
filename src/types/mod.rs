//! Type definitions

pub mod job;
pub mod location;
pub mod messages;
pub mod route;
pub mod stop;
pub mod traffic;
pub mod vehicle;

pub use job::*;
pub use location::*;
pub use messages::*;
pub use route::*;
pub use stop::*;
pub use traffic::*;
pub use vehicle::*;
