//! Typed request and response structs for every ADS command.
//!
//! Each command family gets a request and a response type that convert to and
//! from [`AmsFrame`]. Commands whose bodies carry variable data (`Read`
//! responses, `Write` requests, `ReadWrite` both ways, notification streams)
//! come as a zero-copy view borrowing from the frame plus an `…Owned`
//! counterpart for storage and channels.

mod add_notification;
mod delete_notification;
mod error;
mod notification;
mod read;
mod read_device_info;
mod read_state;
mod read_write;
mod sum;
mod util;
mod write;
mod write_control;

pub use add_notification::{AddNotificationRequest, AddNotificationResponse, NotificationSettings};
pub use delete_notification::{DeleteNotificationRequest, DeleteNotificationResponse};
pub use error::ProtocolError;
pub use notification::{
    DeviceNotification, DeviceNotificationOwned, NotificationSample, NotificationSampleOwned,
    NotificationStamp, NotificationStampOwned,
};
pub use read::{ReadRequest, ReadResponse, ReadResponseOwned};
pub use read_device_info::{DeviceInfo, ReadDeviceInfoRequest, ReadDeviceInfoResponse};
pub use read_state::{ReadStateRequest, ReadStateResponse};
pub use read_write::{
    ReadWriteRequest, ReadWriteRequestOwned, ReadWriteResponse, ReadWriteResponseOwned,
};
pub use sum::{SumReadWriteItem, SumReadWriteResult, decode_sum_read_write, encode_sum_read_write};
pub use util::parse_ads_frame;
pub use write::{WriteRequest, WriteRequestOwned, WriteResponse};
pub use write_control::{WriteControlRequest, WriteControlResponse};
