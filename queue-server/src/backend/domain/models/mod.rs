pub mod customer;
pub mod outlet;
pub mod queue_day;
