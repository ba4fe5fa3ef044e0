pub mod api_router;
pub mod audit;
pub mod authz;
pub mod identity;
pub mod notify;
pub mod shared;
pub mod store;
pub mod sync;
pub mod tickets;
