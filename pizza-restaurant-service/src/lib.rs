pub mod api;
pub mod models;
pub mod schema;
pub mod seed;
pub mod serializer;
pub mod store;
pub mod validation;
