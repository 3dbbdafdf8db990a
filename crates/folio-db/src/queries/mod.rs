//! Queries grouped by table. Every statement that touches user-owned rows
//! carries the owner id in its WHERE clause.

mod blocks;
mod campaigns;
mod profiles;
mod smtp;
mod subscriptions;
mod users;
mod visits;

pub use blocks::ReorderOutcome;
