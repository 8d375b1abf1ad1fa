mod files;
mod status;

pub use files::{delete_file, download_file, file_exists, upload_file};
pub use status::server_status;
