pub mod model;
mod repo;
mod sweeper;

pub use model::OrderStatus;
pub use repo::{OrderStore, PgOrders};
pub use sweeper::OrderSweeper;
