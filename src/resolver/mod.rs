//! Resolver facade over the static and dynamic stores

mod builder;
mod tenant;

pub use builder::{Muninn, MuninnBuilder};
pub use tenant::TenantResolver;
