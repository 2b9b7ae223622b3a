use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, NotificationHandle, StateFlag,
    WindowsFileTime,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// A zero-copy view of one sample inside a device notification.
///
/// Wire layout: handle u32, size u32, data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationSample<'a> {
    handle: NotificationHandle,
    data: &'a [u8],
}

impl<'a> NotificationSample<'a> {
    /// The fixed prefix of a sample (handle + size).
    pub const HEAD_SIZE: usize = 8;

    /// Returns the subscription handle this sample belongs to.
    pub fn handle(&self) -> NotificationHandle {
        self.handle
    }

    /// Returns a zero-copy slice of the sample bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Copies this view into an owned [`NotificationSampleOwned`].
    pub fn into_owned(self) -> NotificationSampleOwned {
        NotificationSampleOwned {
            handle: self.handle,
            data: self.data.to_vec(),
        }
    }

    /// Parses one sample, returning it and the remaining bytes.
    fn parse(bytes: &'a [u8]) -> Result<(Self, &'a [u8]), ProtocolError> {
        if bytes.len() < Self::HEAD_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::HEAD_SIZE,
                got: bytes.len(),
            })?;
        }

        let handle = NotificationHandle::try_from_slice(&bytes[0..4]).map_err(AdsError::from)?;
        let size = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;

        if bytes.len() < Self::HEAD_SIZE + size {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::HEAD_SIZE + size,
                got: bytes.len(),
            })?;
        }

        Ok((
            Self {
                handle,
                data: &bytes[Self::HEAD_SIZE..Self::HEAD_SIZE + size],
            },
            &bytes[Self::HEAD_SIZE + size..],
        ))
    }
}

/// A fully owned notification sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationSampleOwned {
    handle: NotificationHandle,
    data: Vec<u8>,
}

impl NotificationSampleOwned {
    /// Creates a new sample.
    pub fn new(handle: NotificationHandle, data: impl Into<Vec<u8>>) -> Self {
        Self {
            handle,
            data: data.into(),
        }
    }

    /// Returns the subscription handle this sample belongs to.
    pub fn handle(&self) -> NotificationHandle {
        self.handle
    }

    /// Returns the sample bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the sample, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The on-wire size of this sample.
    pub fn wire_size(&self) -> usize {
        NotificationSample::HEAD_SIZE + self.data.len()
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
    }
}

/// A zero-copy view of a stamp group: samples sharing one server timestamp.
///
/// Wire layout: timestamp u64 (FILETIME), sample count u32, samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationStamp<'a> {
    timestamp: WindowsFileTime,
    samples: Vec<NotificationSample<'a>>,
}

impl<'a> NotificationStamp<'a> {
    /// The fixed prefix of a stamp (timestamp + sample count).
    pub const HEAD_SIZE: usize = 12;

    /// Returns the server timestamp shared by the samples in this stamp.
    pub fn timestamp(&self) -> WindowsFileTime {
        self.timestamp
    }

    /// Returns the samples in this stamp.
    pub fn samples(&self) -> &[NotificationSample<'a>] {
        &self.samples
    }

    /// Copies this view into an owned [`NotificationStampOwned`].
    pub fn into_owned(self) -> NotificationStampOwned {
        NotificationStampOwned {
            timestamp: self.timestamp,
            samples: self.samples.into_iter().map(|s| s.into_owned()).collect(),
        }
    }

    /// Parses one stamp, returning it and the remaining bytes.
    fn parse(bytes: &'a [u8]) -> Result<(Self, &'a [u8]), ProtocolError> {
        if bytes.len() < Self::HEAD_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::HEAD_SIZE,
                got: bytes.len(),
            })?;
        }

        let timestamp = WindowsFileTime::try_from_slice(&bytes[0..8]).map_err(AdsError::from)?;
        let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

        let mut samples = Vec::with_capacity(count);
        let mut remaining = &bytes[Self::HEAD_SIZE..];
        for _ in 0..count {
            let (sample, rest) = NotificationSample::parse(remaining)?;
            samples.push(sample);
            remaining = rest;
        }

        Ok((Self { timestamp, samples }, remaining))
    }
}

/// A fully owned stamp group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationStampOwned {
    timestamp: WindowsFileTime,
    samples: Vec<NotificationSampleOwned>,
}

impl NotificationStampOwned {
    /// Creates a new stamp.
    pub fn new(timestamp: WindowsFileTime, samples: Vec<NotificationSampleOwned>) -> Self {
        Self { timestamp, samples }
    }

    /// Returns the server timestamp shared by the samples in this stamp.
    pub fn timestamp(&self) -> WindowsFileTime {
        self.timestamp
    }

    /// Returns the samples in this stamp.
    pub fn samples(&self) -> &[NotificationSampleOwned] {
        &self.samples
    }

    /// Consumes the stamp, returning its samples.
    pub fn into_samples(self) -> Vec<NotificationSampleOwned> {
        self.samples
    }

    /// The on-wire size of this stamp.
    pub fn wire_size(&self) -> usize {
        Self::HEAD_SIZE + self.samples.iter().map(|s| s.wire_size()).sum::<usize>()
    }

    /// The fixed prefix of a stamp (timestamp + sample count).
    pub const HEAD_SIZE: usize = NotificationStamp::HEAD_SIZE;

    fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.timestamp.to_bytes());
        out.extend_from_slice(&(self.samples.len() as u32).to_le_bytes());
        for sample in &self.samples {
            sample.write_into(out);
        }
    }
}

/// A zero-copy view of an ADS Device Notification (command `0x0008`).
///
/// Pushed by the server whenever watched values meet their subscription's
/// transmission criteria. Several subscriptions may coalesce into one frame;
/// every sample carries its own handle, so demultiplexing needs no further
/// context.
///
/// Body layout: stamps byte length u32, stamp count u32, stamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceNotification<'a> {
    header: AdsHeader,
    stamps: Vec<NotificationStamp<'a>>,
}

impl<'a> DeviceNotification<'a> {
    /// The fixed prefix of the body (length + stamp count).
    pub const MIN_BODY_SIZE: usize = 8;

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the stamp groups in this notification.
    pub fn stamps(&self) -> &[NotificationStamp<'a>] {
        &self.stamps
    }

    /// Returns a flattened iterator of `(timestamp, sample)` pairs across
    /// all stamp groups, in wire order.
    pub fn iter_samples(
        &self,
    ) -> impl Iterator<Item = (WindowsFileTime, &NotificationSample<'a>)> {
        self.stamps.iter().flat_map(|stamp| {
            let ts = stamp.timestamp();
            stamp.samples().iter().map(move |s| (ts, s))
        })
    }

    /// Copies this view into an owned [`DeviceNotificationOwned`].
    pub fn into_owned(self) -> DeviceNotificationOwned {
        DeviceNotificationOwned {
            header: self.header,
            stamps: self.stamps.into_iter().map(|s| s.into_owned()).collect(),
        }
    }

    fn parse_body(body: &'a [u8]) -> Result<Vec<NotificationStamp<'a>>, ProtocolError> {
        if body.len() < Self::MIN_BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE,
                got: body.len(),
            })?;
        }

        let length = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
        let stamp_count = u32::from_le_bytes(body[4..8].try_into().unwrap()) as usize;

        let stamps_data = &body[Self::MIN_BODY_SIZE..];
        if stamps_data.len() != length {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE + length,
                got: body.len(),
            })?;
        }

        let mut stamps = Vec::with_capacity(stamp_count);
        let mut remaining = stamps_data;
        for _ in 0..stamp_count {
            let (stamp, rest) = NotificationStamp::parse(remaining)?;
            stamps.push(stamp);
            remaining = rest;
        }

        Ok(stamps)
    }
}

impl<'a> TryFrom<&'a AmsFrame> for DeviceNotification<'a> {
    type Error = ProtocolError;

    fn try_from(value: &'a AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::DeviceNotification, false)?;
        let stamps = Self::parse_body(body)?;
        Ok(Self { header, stamps })
    }
}

/// A fully owned ADS Device Notification. Construct one on a server, or
/// convert a view for storage and channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceNotificationOwned {
    header: AdsHeader,
    stamps: Vec<NotificationStampOwned>,
}

impl DeviceNotificationOwned {
    /// The fixed prefix of the body (length + stamp count).
    pub const MIN_BODY_SIZE: usize = DeviceNotification::MIN_BODY_SIZE;

    /// Creates a new notification carrying `stamps`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        stamps: impl Into<Vec<NotificationStampOwned>>,
    ) -> Self {
        let stamps = stamps.into();
        let stamps_wire: usize = stamps.iter().map(|s| s.wire_size()).sum();

        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::DeviceNotification,
            StateFlag::tcp_ads_response(),
            (Self::MIN_BODY_SIZE + stamps_wire) as u32,
            AdsReturnCode::Ok,
            0,
        );
        Self { header, stamps }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the stamp groups in this notification.
    pub fn stamps(&self) -> &[NotificationStampOwned] {
        &self.stamps
    }

    /// Consumes the notification, returning its stamp groups.
    pub fn into_stamps(self) -> Vec<NotificationStampOwned> {
        self.stamps
    }

    /// Returns a flattened iterator of `(timestamp, sample)` pairs across
    /// all stamp groups, in wire order.
    pub fn iter_samples(
        &self,
    ) -> impl Iterator<Item = (WindowsFileTime, &NotificationSampleOwned)> {
        self.stamps.iter().flat_map(|stamp| {
            let ts = stamp.timestamp();
            stamp.samples().iter().map(move |s| (ts, s))
        })
    }

    /// Serializes the notification into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let stamps_wire: usize = self.stamps.iter().map(|s| s.wire_size()).sum();

        let mut payload =
            Vec::with_capacity(AdsHeader::LENGTH + Self::MIN_BODY_SIZE + stamps_wire);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&(stamps_wire as u32).to_le_bytes());
        payload.extend_from_slice(&(self.stamps.len() as u32).to_le_bytes());
        for stamp in &self.stamps {
            stamp.write_into(&mut payload);
        }
        AmsFrame::new(payload)
    }
}
