pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_support;

pub use routes::router as app;
