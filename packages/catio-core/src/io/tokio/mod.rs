//! Asynchronous frame I/O over tokio streams.

pub mod reader;
pub mod stream;
pub mod traits;
pub mod writer;

pub use reader::AmsReader;
pub use stream::AmsStream;
pub use writer::AmsWriter;
