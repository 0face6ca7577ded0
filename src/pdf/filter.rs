//! Stream encoders.

use std::io::{self, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use lopdf::Object;

/// Wrap ASCII85 output after this many characters.
const ASCII85_LINE_LENGTH: usize = 72;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    Flate,
    Ascii85,
}

impl Filter {
    pub fn name(self) -> &'static str {
        match self {
            Filter::Flate => "FlateDecode",
            Filter::Ascii85 => "ASCII85Decode",
        }
    }

    fn object(self) -> Object {
        Object::Name(self.name().as_bytes().to_vec())
    }
}

/// Data encoded for a stream, with the filters a reader must apply, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedStream {
    pub data: Vec<u8>,
    pub filters: Vec<Filter>,
}

impl EncodedStream {
    /// The value of `/Filter`, `None` when the data is not encoded.
    pub fn filter_object(&self) -> Option<Object> {
        match self.filters.as_slice() {
            [] => None,
            [filter] => Some(filter.object()),
            filters => Some(Object::Array(filters.iter().map(|f| f.object()).collect())),
        }
    }
}

/// Deflate `data` with Flate and, if `ascii` is set, armour the result with ASCII85.
pub fn encode(data: &[u8], compress: bool, ascii: bool) -> io::Result<EncodedStream> {
    let mut filters = Vec::new();
    let mut encoded = if compress {
        filters.push(Filter::Flate);
        deflate(data)?
    } else {
        data.to_vec()
    };
    if ascii {
        encoded = ascii85(&encoded);
        filters.insert(0, Filter::Ascii85);
    }
    Ok(EncodedStream {
        data: encoded,
        filters,
    })
}

pub fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// ASCII85 encode `data`, including the `~>` end of data marker.
pub fn ascii85(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 5 / 4 + data.len() / ASCII85_LINE_LENGTH + 4);
    let mut line = 0;
    let mut push = |out: &mut Vec<u8>, bytes: &[u8]| {
        for &b in bytes {
            if line == ASCII85_LINE_LENGTH {
                out.push(b'\n');
                line = 0;
            }
            out.push(b);
            line += 1;
        }
    };

    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(word);
        if value == 0 && chunk.len() == 4 {
            push(&mut out, b"z");
            continue;
        }
        let mut digits = [0u8; 5];
        let mut rest = value;
        for digit in digits.iter_mut().rev() {
            *digit = (rest % 85) as u8 + b'!';
            rest /= 85;
        }
        // A final group of n bytes is written as n + 1 digits
        push(&mut out, &digits[..chunk.len() + 1]);
    }
    out.extend_from_slice(b"~>");
    out
}
