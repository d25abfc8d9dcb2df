pub mod list;
pub mod manage;
pub mod types;
pub mod upload;

pub use types::*;

pub use list::{list_files, retrieve_files};
pub use manage::delete_file;
pub use upload::upload_file;
