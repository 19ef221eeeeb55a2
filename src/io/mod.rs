/// I/O operations for reading and writing image files on the host

/// Image file reader
pub mod reader;
/// Image and extracted file writer
pub mod writer;

pub use reader::read_image_file;
pub use writer::{write_extracted_file, write_image_file};
