pub mod guard;
pub mod permissions;
pub mod policy;
pub mod token;
pub mod user;

pub use guard::*;
pub use permissions::*;
pub use policy::{Access, Resource};
pub use user::*;
