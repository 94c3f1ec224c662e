pub mod fake;
pub mod http_server;
