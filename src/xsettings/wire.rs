//! Decoder for the `_XSETTINGS_SETTINGS` property payload
//!
//! Layout: one byte-order byte (0 = LSB first, 1 = MSB first), three pad
//! bytes, CARD32 serial, CARD32 setting count, then the settings. Each
//! setting is a type byte, a pad byte, CARD16 name length, the name padded
//! to a multiple of 4, CARD32 last-change serial and the value.

use thiserror::Error;

use super::{Rgba, Setting, SettingValue, SettingsTable};

const TYPE_INT: u8 = 0;
const TYPE_STRING: u8 = 1;
const TYPE_COLOR: u8 = 2;

const LSB_FIRST: u8 = 0;
const MSB_FIRST: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("settings data truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid byte order marker {0}")]
    BadByteOrder(u8),

    #[error("unknown type {kind} for setting '{name}'")]
    UnknownType { name: String, kind: u8 },

    #[error("setting '{0}' appears twice")]
    Duplicate(String),

    #[error("setting name at offset {offset} is not valid UTF-8")]
    InvalidName { offset: usize },
}

/// Decoded property contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSettings {
    /// Manager serial, bumped on every change
    pub serial: u32,
    pub settings: SettingsTable,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(WireError::Truncated { offset: self.pos })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip_padding(&mut self, len: usize) -> Result<(), WireError> {
        self.take(padding(len)).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        let b: [u8; 2] = self.take(2)?.try_into().map_err(|_| WireError::Truncated { offset: self.pos })?;
        Ok(if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let b: [u8; 4] = self.take(4)?.try_into().map_err(|_| WireError::Truncated { offset: self.pos })?;
        Ok(if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Decode a complete property value
pub fn decode_settings(data: &[u8]) -> Result<DecodedSettings, WireError> {
    let mut reader = Reader { data, pos: 0, big_endian: false };

    reader.big_endian = match reader.u8()? {
        LSB_FIRST => false,
        MSB_FIRST => true,
        other => return Err(WireError::BadByteOrder(other)),
    };
    reader.take(3)?;
    let serial = reader.u32()?;
    let count = reader.u32()?;

    let mut settings = SettingsTable::new();
    for _ in 0..count {
        let setting = decode_setting(&mut reader)?;
        if settings.contains_key(&setting.name) {
            return Err(WireError::Duplicate(setting.name));
        }
        settings.insert(setting.name.clone(), setting);
    }

    Ok(DecodedSettings { serial, settings })
}

fn decode_setting(reader: &mut Reader<'_>) -> Result<Setting, WireError> {
    let kind = reader.u8()?;
    reader.u8()?;
    let name_len = reader.u16()? as usize;
    let name_offset = reader.pos;
    let name = std::str::from_utf8(reader.take(name_len)?)
        .map_err(|_| WireError::InvalidName { offset: name_offset })?
        .to_string();
    reader.skip_padding(name_len)?;
    let last_change_serial = reader.u32()?;

    let value = match kind {
        TYPE_INT => SettingValue::Int(reader.u32()? as i32),
        TYPE_STRING => {
            let len = reader.u32()? as usize;
            let bytes = reader.take(len)?;
            reader.skip_padding(len)?;
            SettingValue::String(String::from_utf8_lossy(bytes).into_owned())
        }
        TYPE_COLOR => SettingValue::Color(Rgba {
            red: reader.u16()?,
            green: reader.u16()?,
            blue: reader.u16()?,
            alpha: reader.u16()?,
        }),
        kind => return Err(WireError::UnknownType { name, kind }),
    };

    Ok(Setting { name, value, last_change_serial })
}
