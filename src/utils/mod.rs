pub mod config_parser;
pub mod rate_limiter;
pub mod vector_space;
