//! Authentication of socket connections

pub mod jwt;

pub use jwt::{Claims, JwtError, JwtManager};
