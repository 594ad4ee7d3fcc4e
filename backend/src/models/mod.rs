//! Database models for the Repair Shop Management backend

pub mod catalog;
pub mod count;
pub mod movement;
pub mod unit;

pub use catalog::{Location, Product, ProductComponent};
pub use count::{CountLine, CountSession, CountStatus};
pub use movement::{DocumentKind, MovementKind, StockMovement};
pub use unit::{InventoryUnit, UnitStatus};
