//! AIO container header structures and serialization
//!
//! Two fixed little-endian records make up the header region: one 32-byte
//! [`ContainerHeader`] describing the whole image, then one 80-byte
//! [`EntryHeader`] per embedded firmware, in input order. The serializer
//! writes them over the leading region of the composited buffer, so header
//! bytes always win over any payload placed there.

use crate::error::{MergeError, Result};
use crate::{AIO_MAGIC, CONTAINER_HEADER_SIZE, ENTRY_HEADER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Container format version
pub const HEADER_VERSION: u16 = 0x0001;

/// Device type byte recorded in the container header
pub const DEVICE_TYPE: u8 = 0x01;

/// Firmware-version stub recorded in the container header
pub const AIO_FW_VERSION: u32 = 0x1234_5678;

/// Update-control byte recorded in the container header
pub const UPDATE_CONTROL: u8 = 0x00;

/// Fixed device-identity values written into every entry header.
///
/// Grouped here so the serializer owns them outright; offset and overlap
/// logic never touches these fields. Callers cannot override them in this
/// format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: [u8; 2],
    pub unique_id: [u8; 2],
    pub firmware_version: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            vendor_id: 0x04F3,
            product_id: [0x08, 0x56],
            unique_id: [0xFF, 0xFF],
            firmware_version: 0x1234,
        }
    }
}

/// AIO container header (32 bytes)
///
/// Layout, all integers little-endian:
///
/// | offset | size | field |
/// |--------|------|-------|
/// | 0x00   | 4    | magic `"AIOH"` |
/// | 0x04   | 2    | version |
/// | 0x06   | 2    | header_size |
/// | 0x08   | 1    | device_type |
/// | 0x09   | 4    | firmware_version |
/// | 0x0D   | 1    | update_control |
/// | 0x0E   | 1    | entry_count |
/// | 0x0F   | 17   | reserved, 0xFF |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub header_size: u16,
    pub device_type: u8,
    pub firmware_version: u32,
    pub update_control: u8,
    pub entry_count: u8,
}

impl ContainerHeader {
    /// Create the header describing `entry_count` entries and the matching
    /// total header region size.
    pub fn new(entry_count: u8, header_size: u16) -> Self {
        Self {
            magic: AIO_MAGIC,
            version: HEADER_VERSION,
            header_size,
            device_type: DEVICE_TYPE,
            firmware_version: AIO_FW_VERSION,
            update_control: UPDATE_CONTROL,
            entry_count,
        }
    }

    /// Validate magic, version and the count/size relation.
    pub fn validate(&self) -> Result<()> {
        if self.magic != AIO_MAGIC {
            return Err(MergeError::InvalidMagic {
                expected: AIO_MAGIC,
                found: self.magic,
            });
        }
        if self.version != HEADER_VERSION {
            return Err(MergeError::UnsupportedVersion {
                expected: HEADER_VERSION,
                found: self.version,
            });
        }
        if self.entry_count == 0 {
            return Err(MergeError::invalid_image_data("entry count is zero"));
        }
        let expected = CONTAINER_HEADER_SIZE + self.entry_count as usize * ENTRY_HEADER_SIZE;
        if self.header_size as usize != expected {
            return Err(MergeError::invalid_image_data(format!(
                "header size {:#x} does not match {} entries (expected {:#x})",
                self.header_size, self.entry_count, expected
            )));
        }
        Ok(())
    }

    /// Write the header to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u16::<LittleEndian>(self.header_size)?;
        writer.write_u8(self.device_type)?;
        writer.write_u32::<LittleEndian>(self.firmware_version)?;
        writer.write_u8(self.update_control)?;
        writer.write_u8(self.entry_count)?;
        writer.write_all(&[0xFF; 17])?;
        Ok(())
    }

    /// Serialize the header to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(CONTAINER_HEADER_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Deserialize and validate a header from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CONTAINER_HEADER_SIZE {
            return Err(MergeError::TruncatedImage {
                len: data.len(),
                need: CONTAINER_HEADER_SIZE,
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        let version = cursor.read_u16::<LittleEndian>()?;
        let header_size = cursor.read_u16::<LittleEndian>()?;
        let device_type = cursor.read_u8()?;
        let firmware_version = cursor.read_u32::<LittleEndian>()?;
        let update_control = cursor.read_u8()?;
        let entry_count = cursor.read_u8()?;

        let header = Self {
            magic,
            version,
            header_size,
            device_type,
            firmware_version,
            update_control,
            entry_count,
        };
        header.validate()?;
        Ok(header)
    }
}

/// Per-entry header (80 bytes)
///
/// Layout, all integers little-endian:
///
/// | offset | size | field |
/// |--------|------|-------|
/// | 0x00   | 2    | vendor_id |
/// | 0x02   | 32   | unassigned, zero |
/// | 0x22   | 2    | product_id |
/// | 0x24   | 2    | unique_id |
/// | 0x26   | 2    | firmware_version |
/// | 0x28   | 4    | data_offset |
/// | 0x2C   | 4    | data_size |
/// | 0x30   | 4    | CRC-32 |
/// | 0x34   | 12   | CRC pad, zero |
/// | 0x40   | 16   | reserved, 0xFF |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub identity: DeviceIdentity,
    pub data_offset: u32,
    pub data_size: u32,
    pub crc: u32,
}

impl EntryHeader {
    /// Create an entry header with the default device identity.
    pub fn new(data_offset: u32, data_size: u32, crc: u32) -> Self {
        Self {
            identity: DeviceIdentity::default(),
            data_offset,
            data_size,
            crc,
        }
    }

    /// Write the header to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.identity.vendor_id)?;
        writer.write_all(&[0x00; 0x20])?;
        writer.write_all(&self.identity.product_id)?;
        writer.write_all(&self.identity.unique_id)?;
        writer.write_u16::<LittleEndian>(self.identity.firmware_version)?;
        writer.write_u32::<LittleEndian>(self.data_offset)?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        writer.write_u32::<LittleEndian>(self.crc)?;
        writer.write_all(&[0x00; 12])?;
        writer.write_all(&[0xFF; 16])?;
        Ok(())
    }

    /// Serialize the header to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(ENTRY_HEADER_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Deserialize an entry header from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_HEADER_SIZE {
            return Err(MergeError::TruncatedImage {
                len: data.len(),
                need: ENTRY_HEADER_SIZE,
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let vendor_id = cursor.read_u16::<LittleEndian>()?;
        let mut unassigned = [0u8; 0x20];
        cursor.read_exact(&mut unassigned)?;
        let mut product_id = [0u8; 2];
        cursor.read_exact(&mut product_id)?;
        let mut unique_id = [0u8; 2];
        cursor.read_exact(&mut unique_id)?;
        let firmware_version = cursor.read_u16::<LittleEndian>()?;
        let data_offset = cursor.read_u32::<LittleEndian>()?;
        let data_size = cursor.read_u32::<LittleEndian>()?;
        let crc = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            identity: DeviceIdentity {
                vendor_id,
                product_id,
                unique_id,
                firmware_version,
            },
            data_offset,
            data_size,
            crc,
        })
    }
}

/// Parse the full header region of a produced image: the container header
/// plus one entry header per recorded entry.
pub fn read_headers(data: &[u8]) -> Result<(ContainerHeader, Vec<EntryHeader>)> {
    let container = ContainerHeader::from_bytes(data)?;
    let need = container.header_size as usize;
    if data.len() < need {
        return Err(MergeError::TruncatedImage {
            len: data.len(),
            need,
        });
    }

    let mut entries = Vec::with_capacity(container.entry_count as usize);
    for i in 0..container.entry_count as usize {
        let start = CONTAINER_HEADER_SIZE + i * ENTRY_HEADER_SIZE;
        entries.push(EntryHeader::from_bytes(&data[start..start + ENTRY_HEADER_SIZE])?);
    }
    Ok((container, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_header_layout() {
        let header = ContainerHeader::new(3, 0x110);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), CONTAINER_HEADER_SIZE);

        assert_eq!(&bytes[0..4], b"AIOH");
        assert_eq!(&bytes[0x04..0x06], &[0x01, 0x00]);
        assert_eq!(&bytes[0x06..0x08], &[0x10, 0x01]);
        assert_eq!(bytes[0x08], 0x01);
        assert_eq!(&bytes[0x09..0x0D], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(bytes[0x0D], 0x00);
        assert_eq!(bytes[0x0E], 3);
        assert!(bytes[0x0F..0x20].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_container_header_round_trip() {
        let header = ContainerHeader::new(5, (0x20 + 5 * 0x50) as u16);
        let bytes = header.to_bytes().unwrap();
        let parsed = ContainerHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_container_header_invalid_magic() {
        let header = ContainerHeader::new(1, 0x70);
        let mut bytes = header.to_bytes().unwrap();
        bytes[0] = b'X';
        let err = ContainerHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, MergeError::InvalidMagic { .. }));
    }

    #[test]
    fn test_container_header_unsupported_version() {
        let header = ContainerHeader::new(1, 0x70);
        let mut bytes = header.to_bytes().unwrap();
        bytes[0x04] = 0x02;
        let err = ContainerHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedVersion { found: 0x0002, .. }));
    }

    #[test]
    fn test_container_header_size_mismatch() {
        let header = ContainerHeader::new(3, 0x70);
        let bytes = header.to_bytes().unwrap();
        assert!(ContainerHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_entry_header_layout() {
        let header = EntryHeader::new(0x110, 0x1000, 0xDEAD_BEEF);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), ENTRY_HEADER_SIZE);

        assert_eq!(&bytes[0x00..0x02], &[0xF3, 0x04]);
        assert!(bytes[0x02..0x22].iter().all(|&b| b == 0x00));
        assert_eq!(&bytes[0x22..0x24], &[0x08, 0x56]);
        assert_eq!(&bytes[0x24..0x26], &[0xFF, 0xFF]);
        assert_eq!(&bytes[0x26..0x28], &[0x34, 0x12]);
        assert_eq!(&bytes[0x28..0x2C], &[0x10, 0x01, 0x00, 0x00]);
        assert_eq!(&bytes[0x2C..0x30], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(&bytes[0x30..0x34], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert!(bytes[0x34..0x40].iter().all(|&b| b == 0x00));
        assert!(bytes[0x40..0x50].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_entry_header_round_trip() {
        let header = EntryHeader::new(0x2000, 0x345, 0x1122_3344);
        let bytes = header.to_bytes().unwrap();
        let parsed = EntryHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_read_headers() {
        let header_size = (0x20 + 2 * 0x50) as u16;
        let mut data = ContainerHeader::new(2, header_size).to_bytes().unwrap();
        data.extend(EntryHeader::new(0xC0, 0x10, 1).to_bytes().unwrap());
        data.extend(EntryHeader::new(0xD0, 0x20, 2).to_bytes().unwrap());

        let (container, entries) = read_headers(&data).unwrap();
        assert_eq!(container.entry_count, 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data_offset, 0xC0);
        assert_eq!(entries[1].data_size, 0x20);
    }

    #[test]
    fn test_read_headers_truncated() {
        let header_size = (0x20 + 2 * 0x50) as u16;
        let data = ContainerHeader::new(2, header_size).to_bytes().unwrap();
        // entry table missing entirely
        let err = read_headers(&data).unwrap_err();
        assert!(matches!(err, MergeError::TruncatedImage { .. }));
    }
}
