//! Session establishment with bounded retry and scoped ownership of the
//! live client handle.

mod manager;
mod state;

pub use manager::ConnectionManager;
pub use state::ConnectionState;
