pub mod ports;
pub mod process_upload_use_case;
