pub mod config;
pub mod momentum;
pub mod period;
pub mod visibility;
