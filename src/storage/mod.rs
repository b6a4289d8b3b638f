pub mod error;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use record::{RecordId, Temperature};
pub use store::TemperatureStore;
