//! Minimal pkzip writer for tests.
//!
//! Produces archives with stored or deflated entries, directory
//! entries, and Unix modes in the external attributes, which is enough
//! to exercise every path of the archive reader without shelling out
//! to a zip tool.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

struct Entry {
    name: Vec<u8>,
    data: Vec<u8>,
    uncompressed_size: u32,
    crc32: u32,
    method: u16,
    external_attrs: u32,
}

#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, name: &str, bytes: &[u8]) -> Self {
        self.entry(name, bytes, METHOD_STORED, 0o100_644 << 16)
    }

    pub fn executable(self, name: &str, bytes: &[u8]) -> Self {
        self.entry(name, bytes, METHOD_STORED, 0o100_755 << 16)
    }

    pub fn symlink(self, name: &str, target: &[u8]) -> Self {
        self.entry(name, target, METHOD_STORED, 0o120_777 << 16)
    }

    pub fn dir(self, name: &str) -> Self {
        // DOS directory bit plus Unix mode in the upper half.
        self.entry(name, b"", METHOD_STORED, (0o040_755 << 16) | 0x10)
    }

    pub fn deflated_file(self, name: &str, bytes: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        let compressed = encoder.finish().unwrap();
        self.raw_entry(name, bytes, compressed, METHOD_DEFLATED, 0o100_644 << 16)
    }

    /// An entry claiming an arbitrary compression method; the payload
    /// bytes are written as-is.
    pub fn with_method(self, name: &str, bytes: &[u8], method: u16) -> Self {
        self.entry(name, bytes, method, 0o100_644 << 16)
    }

    fn entry(self, name: &str, bytes: &[u8], method: u16, external_attrs: u32) -> Self {
        self.raw_entry(name, bytes, bytes.to_vec(), method, external_attrs)
    }

    fn raw_entry(
        mut self,
        name: &str,
        original: &[u8],
        stored: Vec<u8>,
        method: u16,
        external_attrs: u32,
    ) -> Self {
        let mut crc = Crc::new();
        crc.update(original);
        self.entries.push(Entry {
            name: name.as_bytes().to_vec(),
            data: stored,
            uncompressed_size: original.len() as u32,
            crc32: crc.sum(),
            method,
            external_attrs,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            offsets.push(out.len() as u32);
            out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // mod time
            out.extend_from_slice(&0u16.to_le_bytes()); // mod date
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra len
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.data);
        }

        let cd_offset = out.len() as u32;
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            out.extend_from_slice(&0x031Eu16.to_le_bytes()); // made by: unix
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // mod time
            out.extend_from_slice(&0u16.to_le_bytes()); // mod date
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra len
            out.extend_from_slice(&0u16.to_le_bytes()); // comment len
            out.extend_from_slice(&0u16.to_le_bytes()); // disk number
            out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            out.extend_from_slice(&entry.external_attrs.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&entry.name);
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // cd start disk
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len

        out
    }
}
