//! Memory-only pkzip reader.
//!
//! Parses the central directory of a stored/deflated archive held
//! entirely in memory and extracts individual entries into capped
//! buffers. Nothing here touches the filesystem or trusts entry names:
//! every name is sanitized before it can reach a bundle, and rejected
//! names are surfaced as diagnostics rather than silently dropped.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::error::ArchiveError;

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_SIGNATURE: u32 = 0x0403_4b50;

/// Fixed EOCD record length plus the maximum comment length.
const EOCD_SEARCH_WINDOW: usize = 22 + 65_535;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// One central-directory entry with a sanitized name.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Sanitized, forward-slash-relative name.
    pub name: String,
    /// Name exactly as stored in the central directory.
    pub raw_name: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub compression_method: u16,
    pub local_header_offset: u64,
    pub external_attrs: u32,
    pub is_directory: bool,
}

impl ArchiveEntry {
    /// Upper 16 bits of `external_attrs` interpreted as a Unix mode.
    fn unix_mode(&self) -> u32 {
        self.external_attrs >> 16
    }

    pub fn is_symlink(&self) -> bool {
        self.unix_mode() & 0o170_000 == 0o120_000
    }

    pub fn is_executable(&self) -> bool {
        self.unix_mode() & 0o111 != 0
    }
}

/// Outcome of extracting a single entry.
#[derive(Debug)]
pub enum Extracted {
    Bytes(Vec<u8>),
    /// Compression method clawguard does not decode. The archive as a
    /// whole remains usable.
    Unsupported(u16),
}

/// Parsed central directory over a borrowed byte slice.
#[derive(Debug)]
pub struct Archive<'a> {
    data: &'a [u8],
    entries: Vec<ArchiveEntry>,
    /// Raw names that failed sanitization, in central-directory order.
    invalid_paths: Vec<String>,
}

impl<'a> Archive<'a> {
    /// Parse the central directory strictly. Any structural mismatch
    /// fails the whole archive.
    pub fn parse(data: &'a [u8]) -> Result<Self, ArchiveError> {
        let eocd = find_eocd(data)?;
        let entry_count = read_u16(data, eocd + 10)? as usize;
        let cd_size = read_u32(data, eocd + 12)? as usize;
        let cd_offset = read_u32(data, eocd + 16)? as usize;

        if cd_offset
            .checked_add(cd_size)
            .map_or(true, |end| end > data.len())
        {
            return Err(ArchiveError::Truncated("central directory"));
        }

        let mut entries = Vec::with_capacity(entry_count.min(1024));
        let mut invalid_paths = Vec::new();
        let mut cursor = cd_offset;

        for _ in 0..entry_count {
            if read_u32(data, cursor)? != CENTRAL_SIGNATURE {
                return Err(ArchiveError::BadSignature("central directory entry"));
            }

            let method = read_u16(data, cursor + 10)?;
            let compressed_size = read_u32(data, cursor + 20)? as u64;
            let uncompressed_size = read_u32(data, cursor + 24)? as u64;
            let name_len = read_u16(data, cursor + 28)? as usize;
            let extra_len = read_u16(data, cursor + 30)? as usize;
            let comment_len = read_u16(data, cursor + 32)? as usize;
            let external_attrs = read_u32(data, cursor + 38)?;
            let local_header_offset = read_u32(data, cursor + 42)? as u64;

            let name_start = cursor + 46;
            let name_end = name_start
                .checked_add(name_len)
                .ok_or(ArchiveError::Truncated("entry name"))?;
            if name_end > data.len() {
                return Err(ArchiveError::Truncated("entry name"));
            }
            let raw_name = String::from_utf8_lossy(&data[name_start..name_end]).into_owned();

            match sanitize_entry_name(&raw_name) {
                Some(name) => {
                    let is_directory = raw_name.ends_with('/');
                    entries.push(ArchiveEntry {
                        name,
                        raw_name,
                        compressed_size,
                        uncompressed_size,
                        compression_method: method,
                        local_header_offset,
                        external_attrs,
                        is_directory,
                    });
                }
                None => invalid_paths.push(raw_name),
            }

            cursor = name_end
                .checked_add(extra_len + comment_len)
                .ok_or(ArchiveError::Truncated("entry record"))?;
        }

        Ok(Self {
            data,
            entries,
            invalid_paths,
        })
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn invalid_paths(&self) -> &[String] {
        &self.invalid_paths
    }

    /// Pick entries worth extracting for a scan, in central-directory
    /// order. Skips directories, empty entries, symlinks, and entries
    /// over `max_entry_bytes`; stops once the running uncompressed
    /// total would exceed `max_total_bytes` or `max_entries` are
    /// picked.
    pub fn select_for_scan(
        &self,
        max_entry_bytes: u64,
        max_total_bytes: u64,
        max_entries: usize,
    ) -> Vec<&ArchiveEntry> {
        let mut picked = Vec::new();
        let mut total = 0u64;

        for entry in &self.entries {
            if picked.len() >= max_entries {
                break;
            }
            if entry.is_directory || entry.is_symlink() || entry.uncompressed_size == 0 {
                continue;
            }
            if entry.uncompressed_size > max_entry_bytes {
                continue;
            }
            if total.saturating_add(entry.uncompressed_size) > max_total_bytes {
                break;
            }
            total += entry.uncompressed_size;
            picked.push(entry);
        }

        picked
    }

    /// Extract one entry into a buffer capped at `max_out_bytes`.
    ///
    /// Symlink entries are never extracted; callers filter them via
    /// [`Archive::select_for_scan`] or [`ArchiveEntry::is_symlink`].
    pub fn extract(
        &self,
        entry: &ArchiveEntry,
        max_out_bytes: u64,
    ) -> Result<Extracted, ArchiveError> {
        let offset = usize::try_from(entry.local_header_offset)
            .map_err(|_| ArchiveError::Truncated("local header offset"))?;
        if read_u32(self.data, offset)? != LOCAL_SIGNATURE {
            return Err(ArchiveError::BadSignature("local file header"));
        }

        // Local-header name/extra lengths may differ from the central
        // directory; the data offset must come from the local record.
        let name_len = read_u16(self.data, offset + 26)? as usize;
        let extra_len = read_u16(self.data, offset + 28)? as usize;
        let data_start = offset
            .checked_add(30 + name_len + extra_len)
            .ok_or(ArchiveError::Truncated("entry data"))?;
        let data_end = data_start
            .checked_add(entry.compressed_size as usize)
            .ok_or(ArchiveError::Truncated("entry data"))?;
        if data_end > self.data.len() {
            return Err(ArchiveError::Truncated("entry data"));
        }
        let raw = &self.data[data_start..data_end];

        match entry.compression_method {
            METHOD_STORED => {
                if raw.len() as u64 > max_out_bytes {
                    return Err(ArchiveError::EntryTooLarge { cap: max_out_bytes });
                }
                Ok(Extracted::Bytes(raw.to_vec()))
            }
            METHOD_DEFLATED => {
                let mut out = Vec::new();
                let mut decoder = DeflateDecoder::new(raw).take(max_out_bytes + 1);
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| ArchiveError::Deflate(e.to_string()))?;
                if out.len() as u64 > max_out_bytes {
                    return Err(ArchiveError::EntryTooLarge { cap: max_out_bytes });
                }
                Ok(Extracted::Bytes(out))
            }
            other => Ok(Extracted::Unsupported(other)),
        }
    }
}

/// Locate the end-of-central-directory record by scanning backwards
/// over the last 22 + 65535 bytes.
fn find_eocd(data: &[u8]) -> Result<usize, ArchiveError> {
    if data.len() < 22 {
        return Err(ArchiveError::MissingEocd);
    }
    let window_start = data.len().saturating_sub(EOCD_SEARCH_WINDOW);
    let mut pos = data.len() - 22;
    loop {
        if read_u32(data, pos)? == EOCD_SIGNATURE {
            return Ok(pos);
        }
        if pos == window_start {
            return Err(ArchiveError::MissingEocd);
        }
        pos -= 1;
    }
}

/// Sanitize an archive entry name.
///
/// Rejects names containing NUL, names starting with `/` or `\`, and
/// names with any `.` or `..` segment. Directory entries keep their
/// trailing slash stripped in the normalized form.
pub fn sanitize_entry_name(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.contains('\0') {
        return None;
    }
    if raw.starts_with('/') || raw.starts_with('\\') {
        return None;
    }
    let trimmed = raw.strip_suffix('/').unwrap_or(raw);
    for segment in trimmed.split('/') {
        if segment == "." || segment == ".." {
            return None;
        }
    }
    Some(trimmed.to_string())
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, ArchiveError> {
    let end = offset.checked_add(2).ok_or(ArchiveError::Truncated("u16"))?;
    if end > data.len() {
        return Err(ArchiveError::Truncated("u16"));
    }
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, ArchiveError> {
    let end = offset.checked_add(4).ok_or(ArchiveError::Truncated("u32"))?;
    if end > data.len() {
        return Err(ArchiveError::Truncated("u32"));
    }
    Ok(u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}
