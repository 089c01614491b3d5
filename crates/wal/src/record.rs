//! Log record types and their binary form.

use crate::errors::{WalError, WalResult};
use binary_helpers::be::{read_be, write_be};
use page::rid::{RID_LEN, Rid};

/// Log sequence number; strictly monotonic within a log file.
pub type Lsn = u64;

/// Transaction identifier.
pub type TxnId = u32;

/// Operation byte of a log record.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalOp {
    Insert = 0x01,
    Update = 0x02,
    Delete = 0x03,
    Commit = 0x10,
    Rollback = 0x11,
    Checkpoint = 0x20,
}

impl WalOp {
    pub fn is_data(self) -> bool {
        matches!(self, WalOp::Insert | WalOp::Update | WalOp::Delete)
    }
}

impl TryFrom<u8> for WalOp {
    type Error = WalError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x01 => Ok(WalOp::Insert),
            0x02 => Ok(WalOp::Update),
            0x03 => Ok(WalOp::Delete),
            0x10 => Ok(WalOp::Commit),
            0x11 => Ok(WalOp::Rollback),
            0x20 => Ok(WalOp::Checkpoint),
            other => Err(WalError::UnknownOp(other)),
        }
    }
}

/// Payload of a data record: which table, which tuple, and the images needed
/// to redo or undo the mutation.
///
/// `rid` is the tuple's address before the mutation; `new_rid` its address
/// after. They differ only for updates that moved the tuple to another page.
/// Image lengths of zero mean "absent" (a tuple image is never empty, its
/// header alone is six bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub table: String,
    pub rid: Rid,
    pub new_rid: Rid,
    pub before: Option<Vec<u8>>,
    pub after: Option<Vec<u8>>,
}

impl DataPayload {
    fn encoded_len(&self) -> usize {
        2 + self.table.len()
            + RID_LEN * 2
            + 4
            + self.before.as_ref().map_or(0, Vec::len)
            + 4
            + self.after.as_ref().map_or(0, Vec::len)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut scratch = [0u8; 2];
        let _ = write_be::<u16>(&mut scratch, 0, self.table.len() as u16);
        buf.extend_from_slice(&scratch);
        buf.extend_from_slice(self.table.as_bytes());
        buf.extend_from_slice(&self.rid.to_bytes());
        buf.extend_from_slice(&self.new_rid.to_bytes());
        for image in [&self.before, &self.after] {
            let len = image.as_ref().map_or(0, |bytes| bytes.len()) as u32;
            buf.extend_from_slice(&len.to_be_bytes());
            if let Some(bytes) = image {
                buf.extend_from_slice(bytes);
            }
        }
    }

    fn decode(bytes: &[u8], offset: u64) -> WalResult<Self> {
        let corrupt = |reason| WalError::CorruptRecord { offset, reason };

        let table_len =
            read_be::<u16>(bytes, 0).map_err(|_| corrupt("payload shorter than table name"))? as usize;
        let mut at = 2;
        let table = std::str::from_utf8(
            bytes
                .get(at..at + table_len)
                .ok_or(corrupt("table name past payload end"))?,
        )
        .map_err(|_| corrupt("table name is not utf-8"))?
        .to_string();
        at += table_len;

        let rid = Rid::from_bytes(bytes.get(at..at + RID_LEN).ok_or(corrupt("missing rid"))?)
            .map_err(|_| corrupt("missing rid"))?;
        at += RID_LEN;
        let new_rid =
            Rid::from_bytes(bytes.get(at..at + RID_LEN).ok_or(corrupt("missing new rid"))?)
                .map_err(|_| corrupt("missing new rid"))?;
        at += RID_LEN;

        let mut images = [None, None];
        for image in &mut images {
            let len = read_be::<u32>(bytes, at).map_err(|_| corrupt("missing image length"))? as usize;
            at += 4;
            if len > 0 {
                let data = bytes
                    .get(at..at + len)
                    .ok_or(corrupt("image past payload end"))?;
                *image = Some(data.to_vec());
                at += len;
            }
        }
        let [before, after] = images;

        Ok(Self {
            table,
            rid,
            new_rid,
            before,
            after,
        })
    }
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub lsn: Lsn,
    pub txn_id: TxnId,
    pub op: WalOp,
    /// Present exactly for data operations.
    pub payload: Option<DataPayload>,
}

impl WalRecord {
    /// Serializes the record with framing: `length | body | crc32`, where the
    /// body is `lsn | txn_id | op | payload` and both length and CRC cover
    /// the body.
    pub fn encode(&self) -> Vec<u8> {
        let payload_len = self.payload.as_ref().map_or(0, DataPayload::encoded_len);
        let body_len = 8 + 4 + 1 + payload_len;

        let mut buf = Vec::with_capacity(4 + body_len + 4);
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.extend_from_slice(&self.lsn.to_be_bytes());
        buf.extend_from_slice(&self.txn_id.to_be_bytes());
        buf.push(self.op as u8);
        if let Some(payload) = &self.payload {
            payload.encode_into(&mut buf);
        }

        let crc = crc32fast::hash(&buf[4..]);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Decodes a record body (everything between the length prefix and the
    /// CRC). The caller has already verified the CRC.
    pub fn decode_body(body: &[u8], offset: u64) -> WalResult<Self> {
        let corrupt = |reason| WalError::CorruptRecord { offset, reason };
        if body.len() < 13 {
            return Err(corrupt("record body shorter than its fixed header"));
        }

        let lsn = read_be::<u64>(body, 0).map_err(|_| corrupt("missing lsn"))?;
        let txn_id = read_be::<u32>(body, 8).map_err(|_| corrupt("missing txn id"))?;
        let op = WalOp::try_from(body[12])?;

        let payload = if op.is_data() {
            Some(DataPayload::decode(&body[13..], offset)?)
        } else {
            None
        };

        Ok(Self {
            lsn,
            txn_id,
            op,
            payload,
        })
    }
}
