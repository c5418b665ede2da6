// Settlement split computation for escrow payouts
pub mod calculator;
pub mod models;

pub use calculator::compute_settlement;
