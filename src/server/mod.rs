mod handlers;
mod models;
mod process;
mod state;

pub use handlers::run_server;
