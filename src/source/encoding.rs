//! Input byte-encoding detection and streaming transcoding to UTF-8

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

use encoding_rs::{Decoder, Encoding, UTF_8, WINDOWS_1252};

use crate::error::SourceError;

/// Number of bytes sniffed when auto-detecting an encoding
const SNIFF_BYTES: usize = 64 * 1024;

const IN_BUF: usize = 16 * 1024;
const OUT_BUF: usize = 32 * 1024;

/// Declared or auto-detected input encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingChoice {
    /// BOM sniffing, then UTF-8 if the prefix validates, else Windows-1252
    #[default]
    Auto,
    Declared(&'static Encoding),
}

impl EncodingChoice {
    /// Parse a WHATWG encoding label such as `utf-8`, `latin1` or `windows-1252`
    pub fn from_label(label: &str) -> Result<Self, SourceError> {
        if label.eq_ignore_ascii_case("auto") || label.is_empty() {
            return Ok(EncodingChoice::Auto);
        }
        Encoding::for_label(label.trim().as_bytes())
            .map(EncodingChoice::Declared)
            .ok_or_else(|| SourceError::UnknownEncoding(label.to_string()))
    }
}

impl std::str::FromStr for EncodingChoice {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

impl std::fmt::Display for EncodingChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingChoice::Auto => write!(f, "auto"),
            EncodingChoice::Declared(enc) => write!(f, "{}", enc.name()),
        }
    }
}

/// Pick an encoding for a file from its first bytes
pub fn detect(prefix: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(prefix) {
        return encoding;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => UTF_8,
        // A multi-byte sequence cut off by the sniff window is still UTF-8
        Err(e) if e.error_len().is_none() => UTF_8,
        Err(_) => WINDOWS_1252,
    }
}

/// Open `path` as a UTF-8 byte stream, decoding from the chosen encoding
pub fn open_transcoded(
    path: &Path,
    choice: EncodingChoice,
) -> Result<TranscodingReader<Box<dyn Read>>, SourceError> {
    let mut file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut prefix = Vec::with_capacity(SNIFF_BYTES);
    (&mut file)
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut prefix)
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            line: 0,
            source,
        })?;

    let encoding = match choice {
        EncodingChoice::Auto => detect(&prefix),
        EncodingChoice::Declared(encoding) => encoding,
    };

    let inner: Box<dyn Read> = Box::new(Cursor::new(prefix).chain(file));
    Ok(TranscodingReader::new(inner, encoding))
}

/// A `Read` adapter that decodes any supported encoding into UTF-8.
///
/// Malformed sequences become U+FFFD; the number of decode calls that had to
/// replace bytes is available through [`TranscodingReader::replacements`].
pub struct TranscodingReader<R> {
    inner: R,
    encoding: &'static Encoding,
    decoder: Decoder,
    in_buf: Box<[u8]>,
    in_start: usize,
    in_end: usize,
    out_buf: Box<[u8]>,
    out_start: usize,
    out_end: usize,
    eof: bool,
    finished: bool,
    replacements: u64,
}

impl<R: Read> TranscodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
            in_buf: vec![0; IN_BUF].into_boxed_slice(),
            in_start: 0,
            in_end: 0,
            out_buf: vec![0; OUT_BUF].into_boxed_slice(),
            out_start: 0,
            out_end: 0,
            eof: false,
            finished: false,
            replacements: 0,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn replacements(&self) -> u64 {
        self.replacements
    }
}

impl<R: Read> Read for TranscodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.out_start < self.out_end {
                let n = buf.len().min(self.out_end - self.out_start);
                buf[..n].copy_from_slice(&self.out_buf[self.out_start..self.out_start + n]);
                self.out_start += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            if self.in_start == self.in_end && !self.eof {
                let n = self.inner.read(&mut self.in_buf)?;
                self.in_start = 0;
                self.in_end = n;
                if n == 0 {
                    self.eof = true;
                }
            }

            let (result, read, written, replaced) = self.decoder.decode_to_utf8(
                &self.in_buf[self.in_start..self.in_end],
                &mut self.out_buf,
                self.eof,
            );
            self.in_start += read;
            self.out_start = 0;
            self.out_end = written;
            if replaced {
                self.replacements += 1;
            }
            if self.eof && matches!(result, encoding_rs::CoderResult::InputEmpty) {
                self.finished = true;
            }
        }
    }
}
