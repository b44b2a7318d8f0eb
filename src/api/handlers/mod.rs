mod health;
mod media;
mod upload;

pub use health::health;
pub use media::serve_media;
pub use upload::{upload_file, uploaded_files};
