pub mod migrations;
pub mod store;

pub use store::{NewApplication, PortalStore, StoredApplication, StoredUser};
