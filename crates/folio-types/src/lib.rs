pub mod api;
pub mod blocks;
pub mod models;
pub mod themes;
