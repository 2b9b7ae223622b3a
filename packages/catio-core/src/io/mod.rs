pub mod frame;
pub mod tokio;

pub use frame::{AMS_FRAME_MAX_LEN, AmsFrame};
pub use tokio::{AmsReader, AmsStream, AmsWriter};
