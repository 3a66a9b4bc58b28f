pub mod activity;
pub mod catalog;
pub mod follow;
pub mod goal;
pub mod momentum;
pub mod profile;
