//! Feature report codec
//!
//! Every register exchange travels as a fixed-size feature report. The
//! engine builds the exact byte layout here; the transport never reorders
//! or coalesces requests. Three report flavours exist:
//!
//! - write:        `[write id] [addr lo] [addr hi] [data...]`
//! - read request: `[request id] [addr lo] [addr hi] [len lo] [len hi]`
//! - read data:    `[data id] [data...]`
//!
//! All reports are zero-padded to [`RegisterMap::report_len`].

use crate::error::{Error, Result};

/// Upper bound on the fixed report length the codec supports
pub const MAX_REPORT_LEN: usize = 272;

/// Bytes of framing in a register write report
pub const WRITE_HEADER_LEN: usize = 3;

/// A report buffer padded to the device's fixed report length
pub type Report = heapless::Vec<u8, MAX_REPORT_LEN>;

/// Register addresses and report framing for one device
///
/// The engine parameterizes over this; the addresses are device-specific
/// constant data that must be sourced from the device's register
/// descriptor table, not protocol logic. The defaults below are a
/// representative layout for bring-up against the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// Report id for register writes
    pub write_report_id: u8,
    /// Report id for read requests
    pub read_request_report_id: u8,
    /// Report id carried by read data responses
    pub read_data_report_id: u8,
    /// Fixed report length in bytes, at most [`MAX_REPORT_LEN`]
    pub report_len: u16,
    /// Block number register pair (address / unlock key)
    pub block_number: u16,
    /// Block data window register
    pub block_data: u16,
    /// Flash command register; reads back the flash status
    pub flash_command: u16,
    /// General device command register (reset lives in bit 0)
    pub device_command: u16,
    /// Device status register (mode bits)
    pub device_status: u16,
    /// Base address of the bootloader query registers
    pub query_base: u16,
    /// Running-firmware version query register (three bytes)
    pub firmware_version: u16,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            write_report_id: 0x09,
            read_request_report_id: 0x0a,
            read_data_report_id: 0x0b,
            report_len: 0x40,
            block_number: 0x0090,
            block_data: 0x0092,
            flash_command: 0x0093,
            device_command: 0x0036,
            device_status: 0x0013,
            query_base: 0x0080,
            firmware_version: 0x0019,
        }
    }
}

impl RegisterMap {
    /// Largest register payload that fits one write report
    pub fn max_write_len(&self) -> usize {
        usize::from(self.report_len).saturating_sub(WRITE_HEADER_LEN)
    }
}

fn padded(map: &RegisterMap, used: usize) -> Result<usize> {
    let report_len = usize::from(map.report_len);
    if report_len > MAX_REPORT_LEN || used > report_len {
        return Err(Error::ReportTooLong {
            needed: used as u16,
            capacity: map.report_len,
        });
    }
    Ok(report_len)
}

/// Build a register write report
pub fn write_report(map: &RegisterMap, addr: u16, data: &[u8]) -> Result<Report> {
    let report_len = padded(map, WRITE_HEADER_LEN + data.len())?;
    let mut report = Report::new();
    // Infallible: report_len <= MAX_REPORT_LEN was checked above
    let _ = report.push(map.write_report_id);
    let _ = report.extend_from_slice(&addr.to_le_bytes());
    let _ = report.extend_from_slice(data);
    while report.len() < report_len {
        let _ = report.push(0);
    }
    Ok(report)
}

/// Build a register read request report
pub fn read_request(map: &RegisterMap, addr: u16, len: u16) -> Result<Report> {
    let report_len = padded(map, 5)?;
    if usize::from(len) + 1 > report_len {
        return Err(Error::ReportTooLong {
            needed: len + 1,
            capacity: map.report_len,
        });
    }
    let mut report = Report::new();
    let _ = report.push(map.read_request_report_id);
    let _ = report.extend_from_slice(&addr.to_le_bytes());
    let _ = report.extend_from_slice(&len.to_le_bytes());
    while report.len() < report_len {
        let _ = report.push(0);
    }
    Ok(report)
}

/// Extract the register bytes from a read data response
///
/// A response that is too short or carries the wrong report id is a
/// transport failure, not a protocol status.
pub fn parse_read_data<'r>(map: &RegisterMap, report: &'r [u8], len: u16) -> Result<&'r [u8]> {
    let end = 1 + usize::from(len);
    if report.len() < end || report[0] != map.read_data_report_id {
        return Err(Error::Transport);
    }
    Ok(&report[1..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report_layout() {
        let map = RegisterMap::default();
        let report = write_report(&map, 0x0093, &[0x0f]).unwrap();
        assert_eq!(report.len(), usize::from(map.report_len));
        assert_eq!(&report[..4], &[0x09, 0x93, 0x00, 0x0f]);
        assert!(report[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_request_layout() {
        let map = RegisterMap::default();
        let report = read_request(&map, 0x0080, 2).unwrap();
        assert_eq!(report.len(), usize::from(map.report_len));
        assert_eq!(&report[..5], &[0x0a, 0x80, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let map = RegisterMap::default();
        let data = [0u8; 0x40];
        assert!(matches!(
            write_report(&map, 0, &data),
            Err(Error::ReportTooLong { .. })
        ));
    }

    #[test]
    fn test_parse_read_data() {
        let map = RegisterMap::default();
        let raw = [0x0b, 0xde, 0xad, 0x00];
        assert_eq!(parse_read_data(&map, &raw, 2).unwrap(), &[0xde, 0xad]);
        let bad_id = [0x0c, 0xde, 0xad, 0x00];
        assert_eq!(parse_read_data(&map, &bad_id, 2), Err(Error::Transport));
    }
}
