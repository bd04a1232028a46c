pub mod http;
pub mod persistence;
pub mod providers;
pub mod runtime;
pub mod workers;
