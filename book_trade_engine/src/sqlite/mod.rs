mod store;

pub use store::SqliteOrderStore;
