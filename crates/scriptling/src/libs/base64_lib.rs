//! Implementation of the `base64` library.
//!
//! Operates on strings: `b64encode` takes text and returns its standard
//! base64 form, `b64decode` reverses it and requires valid UTF-8.

use std::rc::Rc;

use crate::{
    exception::Exception,
    interp::Interp,
    value::{Builtin, Library, Value},
};

/// The standard base64 alphabet used for encoding.
const BASE64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Padding character.
const PAD: u8 = b'=';

pub(crate) fn build(_interp: &mut Interp) -> Result<Value, Exception> {
    let lib = Library::new("base64", "Base64 encoding and decoding of text.");

    lib.set(
        "b64encode",
        Value::Builtin(Rc::new(Builtin::new(
            "b64encode",
            "Encode text as standard base64.",
            |_interp, args| {
                let text = args.str_arg(0, "b64encode")?;
                Ok(Value::str(encode(text.as_bytes())))
            },
        ))),
    );

    lib.set(
        "b64decode",
        Value::Builtin(Rc::new(Builtin::new(
            "b64decode",
            "Decode standard base64 into text.",
            |_interp, args| {
                let text = args.str_arg(0, "b64decode")?;
                let bytes = decode(&text)?;
                String::from_utf8(bytes)
                    .map(Value::str)
                    .map_err(|_| Exception::value_error("decoded data is not valid UTF-8"))
            },
        ))),
    );

    Ok(Value::Library(Rc::new(lib)))
}

pub(crate) fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        out.push(BASE64_ALPHABET[(triple >> 18) as usize & 0x3F] as char);
        out.push(BASE64_ALPHABET[(triple >> 12) as usize & 0x3F] as char);
        if chunk.len() > 1 {
            out.push(BASE64_ALPHABET[(triple >> 6) as usize & 0x3F] as char);
        } else {
            out.push(PAD as char);
        }
        if chunk.len() > 2 {
            out.push(BASE64_ALPHABET[triple as usize & 0x3F] as char);
        } else {
            out.push(PAD as char);
        }
    }
    out
}

pub(crate) fn decode(text: &str) -> Result<Vec<u8>, Exception> {
    let cleaned: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if cleaned.len() % 4 != 0 {
        return Err(Exception::value_error("invalid base64 length"));
    }
    let mut out = Vec::with_capacity(cleaned.len() / 4 * 3);
    for chunk in cleaned.chunks(4) {
        let mut triple: u32 = 0;
        let mut pads = 0usize;
        for (i, &b) in chunk.iter().enumerate() {
            let sextet = if b == PAD {
                if i < 2 {
                    return Err(Exception::value_error("invalid base64 padding"));
                }
                pads += 1;
                0
            } else {
                if pads > 0 {
                    return Err(Exception::value_error("invalid base64 padding"));
                }
                decode_char(b)?
            };
            triple = (triple << 6) | u32::from(sextet);
        }
        out.push((triple >> 16) as u8);
        if pads < 2 {
            out.push((triple >> 8) as u8);
        }
        if pads < 1 {
            out.push(triple as u8);
        }
    }
    Ok(out)
}

fn decode_char(b: u8) -> Result<u8, Exception> {
    match b {
        b'A'..=b'Z' => Ok(b - b'A'),
        b'a'..=b'z' => Ok(b - b'a' + 26),
        b'0'..=b'9' => Ok(b - b'0' + 52),
        b'+' => Ok(62),
        b'/' => Ok(63),
        _ => Err(Exception::value_error(format!(
            "invalid base64 character '{}'",
            b as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn decode_reverses_encode() {
        for input in ["", "f", "fo", "foo", "foob", "fooba", "foobar"] {
            let decoded = decode(&encode(input.as_bytes())).unwrap();
            assert_eq!(decoded, input.as_bytes());
        }
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(decode("abc").is_err());
        assert!(decode("a!==").is_err());
        assert!(decode("=abc").is_err());
    }
}
