pub mod connection;
pub mod rate_limit;
pub mod server;
