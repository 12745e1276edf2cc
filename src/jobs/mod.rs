pub mod abandoned_cart;

pub use abandoned_cart::{AbandonedCartScheduler, SweepReport, sweep};
