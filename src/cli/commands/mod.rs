mod config;
mod extract;
mod ingest;
mod init_db;
mod invoice;
mod predict;
mod status;

pub use config::ConfigCommand;
pub use extract::ExtractArgs;
pub use ingest::IngestArgs;
pub use invoice::InvoiceArgs;
pub use predict::PredictArgs;
pub use status::StatusArgs;

pub use config::handle_config;
pub use extract::handle_extract;
pub use ingest::handle_ingest;
pub use init_db::handle_init_db;
pub use invoice::handle_invoice;
pub use predict::handle_predict;
pub use status::handle_status;
