pub mod store;
pub mod test;
