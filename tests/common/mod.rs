mod test_server;

pub use test_server::{ORG_A, ORG_B, TestServer};
