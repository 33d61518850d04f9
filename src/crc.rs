//! CRC-32 checksum calculation
//!
//! The AIO format records a standard CRC-32 (reflected polynomial
//! 0xEDB88320) per entry. Checksums are computed over the final composited
//! image content at each entry's window, never over an entry's original
//! bytes in isolation.

/// Calculate the CRC-32 checksum for the given data.
pub fn calculate_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(calculate_crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_check_value() {
        // reference check value for the 0xEDB88320 polynomial
        assert_eq!(calculate_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_depends_on_content() {
        let a = calculate_crc32(&[0xAA; 64]);
        let b = calculate_crc32(&[0xBB; 64]);
        assert_ne!(a, b);
        assert_eq!(a, calculate_crc32(&[0xAA; 64]));
    }
}
