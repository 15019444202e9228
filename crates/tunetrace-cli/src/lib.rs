//! TuneTrace command-line tools and HTTP front end

pub mod database;
pub mod output;
pub mod server;
