pub mod customer_mapper;
pub mod outlet_mapper;
pub mod snapshot_mapper;
