//! Switch description body.
//!
//! Five NUL-padded text fields of fixed width: manufacturer, hardware,
//! software, serial number and datapath description. Each value must
//! leave room for at least one terminating NUL and may not contain one.

use serde::{Deserialize, Serialize};

use crate::buffer::Segment;
use crate::error::{EncodeError, Result, WireError};

/// Width of the free-form description fields.
pub const DESC_STR_LEN: usize = 256;

/// Width of the serial number field.
pub const SERIAL_NUM_LEN: usize = 32;

/// Encoded size of a [`DescriptorRecord`].
pub const DESC_BODY_LEN: usize = 4 * DESC_STR_LEN + SERIAL_NUM_LEN;

/// Device description, copied by value into each reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub manufacturer: String,
    pub hardware_version: String,
    pub software_version: String,
    pub serial_number: String,
    pub datapath_description: String,
}

impl DescriptorRecord {
    fn fields(&self) -> [(&'static str, &str, usize); 5] {
        [
            ("manufacturer", self.manufacturer.as_str(), DESC_STR_LEN),
            ("hardware_version", self.hardware_version.as_str(), DESC_STR_LEN),
            ("software_version", self.software_version.as_str(), DESC_STR_LEN),
            ("serial_number", self.serial_number.as_str(), SERIAL_NUM_LEN),
            (
                "datapath_description",
                self.datapath_description.as_str(),
                DESC_STR_LEN,
            ),
        ]
    }

    /// Append the fixed-width body at the segment's cursor.
    ///
    /// All fields and the available space are checked before the first byte
    /// is written.
    pub fn encode(&self, segment: &mut Segment) -> std::result::Result<(), EncodeError> {
        let fields = self.fields();
        for (field, value, width) in fields {
            if value.len() >= width {
                return Err(EncodeError::FieldTooLong {
                    field,
                    len: value.len(),
                    max: width - 1,
                });
            }
            if let Some(offset) = value.bytes().position(|b| b == 0) {
                return Err(EncodeError::InteriorNul { field, offset });
            }
        }
        if segment.available() < DESC_BODY_LEN {
            return Err(EncodeError::OutOfSpace {
                needed: DESC_BODY_LEN,
                available: segment.available(),
            });
        }

        for (_, value, width) in fields {
            segment.put_slice(value.as_bytes())?;
            segment.put_zeros(width - value.len())?;
        }
        Ok(())
    }

    /// Parse a body produced by [`DescriptorRecord::encode`].
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < DESC_BODY_LEN {
            return Err(WireError::Truncated {
                what: "description body",
                needed: DESC_BODY_LEN,
                have: body.len(),
            });
        }

        let mut rest = body;
        let mut take = |width: usize| {
            let (field, tail) = rest.split_at(width);
            rest = tail;
            let end = field.iter().position(|&b| b == 0).unwrap_or(width);
            String::from_utf8_lossy(&field[..end]).into_owned()
        };

        Ok(Self {
            manufacturer: take(DESC_STR_LEN),
            hardware_version: take(DESC_STR_LEN),
            software_version: take(DESC_STR_LEN),
            serial_number: take(SERIAL_NUM_LEN),
            datapath_description: take(DESC_STR_LEN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> DescriptorRecord {
        DescriptorRecord {
            manufacturer: "ACME".to_string(),
            hardware_version: "v1".to_string(),
            software_version: "v2".to_string(),
            serial_number: "SN1".to_string(),
            datapath_description: "sw0".to_string(),
        }
    }

    fn open_segment(capacity: usize) -> Segment {
        let mut segment = Segment::with_capacity(capacity);
        segment.set_plen(capacity);
        segment
    }

    #[test]
    fn body_is_fixed_width_and_nul_padded() {
        let mut segment = open_segment(2048);
        acme().encode(&mut segment).unwrap();

        let body = segment.written();
        assert_eq!(body.len(), DESC_BODY_LEN);
        assert_eq!(&body[..5], b"ACME\0");
        assert_eq!(&body[256..259], b"v1\0");
        assert_eq!(&body[512..515], b"v2\0");
        assert_eq!(&body[768..772], b"SN1\0");
        assert_eq!(&body[800..804], b"sw0\0");
        assert!(body[804..].iter().all(|&b| b == 0));
    }

    #[test]
    fn embedded_nul_is_rejected_before_writing() {
        let record = DescriptorRecord {
            hardware_version: "rev\0b".to_string(),
            ..acme()
        };
        let mut segment = open_segment(2048);

        let err = record.encode(&mut segment).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InteriorNul {
                field: "hardware_version",
                offset: 3
            }
        );
        assert!(segment.is_empty());
    }

    #[test]
    fn decode_recovers_fields() {
        let mut segment = open_segment(DESC_BODY_LEN);
        acme().encode(&mut segment).unwrap();
        assert_eq!(DescriptorRecord::decode(segment.written()).unwrap(), acme());
    }

    #[test]
    fn serial_number_must_leave_room_for_nul() {
        let record = DescriptorRecord {
            serial_number: "X".repeat(SERIAL_NUM_LEN),
            ..acme()
        };
        let mut segment = open_segment(2048);

        let err = record.encode(&mut segment).unwrap_err();
        assert_eq!(
            err,
            EncodeError::FieldTooLong {
                field: "serial_number",
                len: 32,
                max: 31
            }
        );
        assert!(segment.is_empty());
    }

    #[test]
    fn longest_fitting_fields_are_accepted() {
        let record = DescriptorRecord {
            manufacturer: "m".repeat(DESC_STR_LEN - 1),
            serial_number: "s".repeat(SERIAL_NUM_LEN - 1),
            ..acme()
        };
        let mut segment = open_segment(DESC_BODY_LEN);
        record.encode(&mut segment).unwrap();
        assert_eq!(DescriptorRecord::decode(segment.written()).unwrap(), record);
    }

    #[test]
    fn short_segment_is_rejected_before_writing() {
        let mut segment = open_segment(DESC_BODY_LEN - 1);
        let err = acme().encode(&mut segment).unwrap_err();
        assert_eq!(
            err,
            EncodeError::OutOfSpace {
                needed: DESC_BODY_LEN,
                available: DESC_BODY_LEN - 1
            }
        );
        assert!(segment.is_empty());
    }

    #[test]
    fn decode_rejects_truncated_body() {
        assert!(matches!(
            DescriptorRecord::decode(&[0; 100]),
            Err(WireError::Truncated { have: 100, .. })
        ));
    }

    #[test]
    fn loads_from_json() {
        let record: DescriptorRecord = serde_json::from_str(
            r#"{
                "manufacturer": "ACME",
                "hardware_version": "v1",
                "software_version": "v2",
                "serial_number": "SN1",
                "datapath_description": "sw0"
            }"#,
        )
        .unwrap();
        assert_eq!(record, acme());
    }
}
