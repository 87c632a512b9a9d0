mod handlers;
mod models;
mod pipeline;
mod state;

pub use handlers::run_server;
