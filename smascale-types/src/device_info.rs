//! Scale identification

use std::fmt;

/// Scale identification, as reported by the three info queries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Model designation
    pub model: String,

    /// Serial number
    pub serial: String,

    /// Software version
    pub software: String,
}

impl DeviceInfo {
    /// Build from raw responses, trimming each field
    pub fn new(model: &str, serial: &str, software: &str) -> Self {
        Self {
            model: model.trim().to_string(),
            serial: serial.trim().to_string(),
            software: software.trim().to_string(),
        }
    }

    /// Iterate over `(name, value)` pairs
    pub fn fields(&self) -> [(&'static str, &str); 3] {
        [
            ("model", &self.model),
            ("serial", &self.serial),
            ("software", &self.software),
        ]
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scale[model: {}, SN: {}, SW: {}]",
            self.model, self.serial, self.software
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_device_info_trims_fields() {
        let info = DeviceInfo::new("SIWADCP-1-  \r\n", " 37454321\r\n", "00-37-09\r\n");

        assert_eq!(info.model, "SIWADCP-1-");
        assert_eq!(info.serial, "37454321");
        assert_eq!(info.software, "00-37-09");
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo::new("SIWADCP-1-", "37454321", "00-37-09");
        assert_eq!(
            info.to_string(),
            "Scale[model: SIWADCP-1-, SN: 37454321, SW: 00-37-09]"
        );
    }
}
