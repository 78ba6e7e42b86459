//! Caller identity. Authentication happens upstream; this module only reads the
//! identity headers the auth proxy forwards.

mod middleware;

pub use middleware::{Actor, AuthError, ORGANIZATION_HEADER, RequireActor, USER_HEADER};
