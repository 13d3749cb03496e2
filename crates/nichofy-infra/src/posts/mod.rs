//! Post access: the cached repository and live subscriptions.

mod live;
mod repository;

pub use live::{LiveSubscriptions, Subscription};
pub use repository::PostRepository;

#[cfg(test)]
mod tests;
