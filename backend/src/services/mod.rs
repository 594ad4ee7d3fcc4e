//! Business logic services for the Repair Shop Management Platform

pub mod catalog;
pub mod counts;
pub mod movements;
pub mod sequence;
pub mod stock;
pub mod units;

pub use catalog::CatalogService;
pub use counts::CountService;
pub use movements::MovementService;
pub use sequence::SequenceService;
pub use stock::StockService;
pub use units::UnitService;
