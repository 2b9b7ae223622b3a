//! The typed command surface (C4) over [`Connection`].
//!
//! One method per command family. Each builds the request, awaits the
//! response slot, checks both the header error code and the body result
//! code, and returns the typed payload. Reads, device-info, and state reads
//! are idempotent at the protocol level; nothing here retries.

use crate::connection::Connection;
use crate::errors::{ClientError, Result};
use catio_core::ads::{
    AdsCommand, AdsHeader, AdsReturnCode, AdsState, IndexGroup, IndexOffset, NotificationHandle,
    index_group,
};
use catio_core::ams::AmsAddr;
use catio_core::io::AmsFrame;
use catio_core::protocol::{
    AddNotificationRequest, AddNotificationResponse, DeleteNotificationRequest,
    DeleteNotificationResponse, DeviceInfo, NotificationSettings, ReadDeviceInfoRequest,
    ReadDeviceInfoResponse, ReadRequest, ReadResponse, ReadStateRequest, ReadStateResponse,
    ReadWriteRequestOwned, ReadWriteResponse, SumReadWriteItem, SumReadWriteResult,
    WriteControlRequest, WriteControlResponse, WriteRequestOwned, WriteResponse,
    decode_sum_read_write, encode_sum_read_write,
};

/// Maps a non-zero return code to a typed device failure.
fn check(code: AdsReturnCode, command: AdsCommand, invoke_id: u32) -> Result<()> {
    if code.is_ok() {
        return Ok(());
    }
    Err(ClientError::Device {
        code,
        command,
        invoke_id,
    })
}

/// Checks the header-level error code of a response frame.
fn check_header(frame: &AmsFrame) -> Result<()> {
    let (header, _) = AdsHeader::parse_prefix(frame.payload())
        .map_err(catio_core::ads::AdsError::from)
        .map_err(catio_core::protocol::ProtocolError::from)?;
    check(header.error_code(), header.command_id(), header.invoke_id())
}

impl Connection {
    /// Queries the target's name, version, and build number.
    pub async fn read_device_info(&self, target: AmsAddr) -> Result<DeviceInfo> {
        let invoke_id = self.next_invoke_id();
        let req = ReadDeviceInfoRequest::new(target, self.local(), invoke_id);
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = ReadDeviceInfoResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::ReadDeviceInfo, invoke_id)?;
        Ok(resp.info().clone())
    }

    /// Reads `length` bytes at `(group, offset)`.
    pub async fn read(
        &self,
        target: AmsAddr,
        group: IndexGroup,
        offset: IndexOffset,
        length: u32,
    ) -> Result<Vec<u8>> {
        let invoke_id = self.next_invoke_id();
        let req = ReadRequest::new(target, self.local(), invoke_id, group, offset, length);
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = ReadResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::Read, invoke_id)?;
        Ok(resp.data().to_vec())
    }

    /// Writes `data` at `(group, offset)`.
    pub async fn write(
        &self,
        target: AmsAddr,
        group: IndexGroup,
        offset: IndexOffset,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let invoke_id = self.next_invoke_id();
        let req = WriteRequestOwned::new(target, self.local(), invoke_id, group, offset, data);
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = WriteResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::Write, invoke_id)
    }

    /// Reads the target's ADS and device state.
    pub async fn read_state(&self, target: AmsAddr) -> Result<(AdsState, u16)> {
        let invoke_id = self.next_invoke_id();
        let req = ReadStateRequest::new(target, self.local(), invoke_id);
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = ReadStateResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::ReadState, invoke_id)?;
        Ok((resp.ads_state(), resp.device_state()))
    }

    /// Requests a state transition on the target.
    pub async fn write_control(
        &self,
        target: AmsAddr,
        ads_state: AdsState,
        device_state: u16,
    ) -> Result<()> {
        let invoke_id = self.next_invoke_id();
        let req = WriteControlRequest::new(
            target,
            self.local(),
            invoke_id,
            ads_state,
            device_state,
            [],
        );
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = WriteControlResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::WriteControl, invoke_id)
    }

    /// Writes `data` then reads `read_length` bytes in one round trip.
    pub async fn read_write(
        &self,
        target: AmsAddr,
        group: IndexGroup,
        offset: IndexOffset,
        read_length: u32,
        data: impl Into<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let invoke_id = self.next_invoke_id();
        let req = ReadWriteRequestOwned::new(
            target,
            self.local(),
            invoke_id,
            group,
            offset,
            read_length,
            data,
        );
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = ReadWriteResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::ReadWrite, invoke_id)?;
        Ok(resp.data().to_vec())
    }

    /// Issues many read-write sub-operations as one batched round trip.
    ///
    /// Sub-operation failures do not fail the batch; each item carries its
    /// own result code.
    pub async fn sum_read_write(
        &self,
        target: AmsAddr,
        items: &[SumReadWriteItem],
    ) -> Result<Vec<SumReadWriteResult>> {
        let (payload, read_length) = encode_sum_read_write(items);
        let body = self
            .read_write(
                target,
                index_group::SUMUP_READ_WRITE,
                items.len() as u32,
                read_length,
                payload,
            )
            .await?;
        Ok(decode_sum_read_write(&body, items.len())?)
    }

    /// Registers a notification subscription, returning the server-assigned
    /// handle.
    pub async fn add_notification(
        &self,
        target: AmsAddr,
        group: IndexGroup,
        offset: IndexOffset,
        length: u32,
        settings: NotificationSettings,
    ) -> Result<NotificationHandle> {
        let invoke_id = self.next_invoke_id();
        let req = AddNotificationRequest::new(
            target,
            self.local(),
            invoke_id,
            group,
            offset,
            length,
            settings,
        );
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = AddNotificationResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::AddDeviceNotification, invoke_id)?;
        Ok(resp.handle())
    }

    /// Cancels a notification subscription server-side.
    pub async fn delete_notification(
        &self,
        target: AmsAddr,
        handle: NotificationHandle,
    ) -> Result<()> {
        let invoke_id = self.next_invoke_id();
        let req = DeleteNotificationRequest::new(target, self.local(), invoke_id, handle);
        let frame = self.transact(invoke_id, req.to_frame()).await?;
        check_header(&frame)?;

        let resp = DeleteNotificationResponse::try_from(&frame)?;
        check(resp.result(), AdsCommand::DeleteDeviceNotification, invoke_id)
    }
}
