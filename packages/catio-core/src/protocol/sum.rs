//! Sum-command codecs: many read-write operations batched into one
//! `ReadWrite` round trip against [`SUMUP_READ_WRITE`].
//!
//! Request write-data layout: one 16-byte sub-header per item (index group,
//! index offset, read length, write length), then the concatenated write
//! data of all items. Response layout: one 8-byte sub-result per item
//! (result code, read length), then the concatenated read data.
//!
//! [`SUMUP_READ_WRITE`]: crate::ads::index_group::SUMUP_READ_WRITE

use super::ProtocolError;
use crate::ads::{AdsError, AdsReturnCode, IndexGroup, IndexOffset};

/// One sub-operation of a batched read-write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SumReadWriteItem {
    /// Index group of the sub-operation.
    pub index_group: IndexGroup,
    /// Index offset of the sub-operation.
    pub index_offset: IndexOffset,
    /// Number of bytes expected back.
    pub read_length: u32,
    /// Bytes to write; may be empty for a pure read.
    pub write_data: Vec<u8>,
}

/// One sub-result of a batched read-write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SumReadWriteResult {
    /// Result code of the sub-operation.
    pub result: AdsReturnCode,
    /// Bytes read; empty if the sub-operation failed.
    pub data: Vec<u8>,
}

/// Packs sub-operations into the write payload of the enclosing
/// `ReadWrite` request. Also returns the total read length to request.
pub fn encode_sum_read_write(items: &[SumReadWriteItem]) -> (Vec<u8>, u32) {
    let data_len: usize = items.iter().map(|i| i.write_data.len()).sum();
    let mut payload = Vec::with_capacity(items.len() * 16 + data_len);

    for item in items {
        payload.extend_from_slice(&item.index_group.to_le_bytes());
        payload.extend_from_slice(&item.index_offset.to_le_bytes());
        payload.extend_from_slice(&item.read_length.to_le_bytes());
        payload.extend_from_slice(&(item.write_data.len() as u32).to_le_bytes());
    }
    for item in items {
        payload.extend_from_slice(&item.write_data);
    }

    let read_length: u32 = items.len() as u32 * 8 + items.iter().map(|i| i.read_length).sum::<u32>();
    (payload, read_length)
}

/// Unpacks the read payload of the enclosing `ReadWrite` response into
/// per-item results.
///
/// The sub-result header declares each item's actual read length; data
/// regions follow the headers in item order.
pub fn decode_sum_read_write(
    body: &[u8],
    item_count: usize,
) -> Result<Vec<SumReadWriteResult>, ProtocolError> {
    let head_len = item_count * 8;
    if body.len() < head_len {
        return Err(AdsError::UnexpectedDataLength {
            expected: head_len,
            got: body.len(),
        })?;
    }

    let mut results = Vec::with_capacity(item_count);
    let mut lengths = Vec::with_capacity(item_count);

    for i in 0..item_count {
        let at = i * 8;
        let result = AdsReturnCode::try_from_slice(&body[at..at + 4]).map_err(AdsError::from)?;
        let length = u32::from_le_bytes(body[at + 4..at + 8].try_into().unwrap()) as usize;
        results.push(SumReadWriteResult {
            result,
            data: Vec::new(),
        });
        lengths.push(length);
    }

    let mut cursor = head_len;
    for (result, length) in results.iter_mut().zip(lengths) {
        if body.len() < cursor + length {
            return Err(AdsError::UnexpectedDataLength {
                expected: cursor + length,
                got: body.len(),
            })?;
        }
        result.data = body[cursor..cursor + length].to_vec();
        cursor += length;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout() {
        let items = vec![
            SumReadWriteItem {
                index_group: 0xF101,
                index_offset: 1,
                read_length: 88,
                write_data: vec![],
            },
            SumReadWriteItem {
                index_group: 0xF003,
                index_offset: 0,
                read_length: 4,
                write_data: b"MAIN.x\0".to_vec(),
            },
        ];

        let (payload, read_length) = encode_sum_read_write(&items);
        assert_eq!(payload.len(), 32 + 7);
        assert_eq!(read_length, 16 + 88 + 4);
        // second sub-header starts at 16; its write length field is at 28
        assert_eq!(u32::from_le_bytes(payload[28..32].try_into().unwrap()), 7);
        // write data follows all sub-headers
        assert_eq!(&payload[32..], b"MAIN.x\0");
    }

    #[test]
    fn decode_two_results() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes()); // ok
        body.extend_from_slice(&2u32.to_le_bytes()); // 2 bytes
        body.extend_from_slice(&0x702u32.to_le_bytes()); // invalid group
        body.extend_from_slice(&0u32.to_le_bytes()); // 0 bytes
        body.extend_from_slice(&[0xAB, 0xCD]);

        let results = decode_sum_read_write(&body, 2).expect("Should decode");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].result, AdsReturnCode::Ok);
        assert_eq!(results[0].data, vec![0xAB, 0xCD]);
        assert_eq!(results[1].result, AdsReturnCode::DeviceInvalidGroup);
        assert!(results[1].data.is_empty());
    }

    #[test]
    fn decode_truncated_rejected() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&8u32.to_le_bytes()); // declares 8 data bytes
        body.extend_from_slice(&[0u8; 2]); // supplies 2

        let err = decode_sum_read_write(&body, 1).unwrap_err();
        assert!(matches!(err, ProtocolError::Ads(_)));
    }

    #[test]
    fn empty_batch() {
        let (payload, read_length) = encode_sum_read_write(&[]);
        assert!(payload.is_empty());
        assert_eq!(read_length, 0);
        assert!(decode_sum_read_write(&[], 0).unwrap().is_empty());
    }
}
