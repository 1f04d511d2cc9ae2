pub mod program_data;
pub mod treasury_config;
pub mod vault_record;

pub use program_data::*;
pub use treasury_config::*;
pub use vault_record::*;
