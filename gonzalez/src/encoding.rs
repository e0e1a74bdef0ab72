/*!
# Byte-stream decoding in front of the lexer

The lexer operates on UTF-8 bytes. This module converts the incoming byte
stream into UTF-8:

- Without the `encoding` cargo feature, only UTF-8 input is supported and a
  leading byte-order mark is stripped.
- With the `encoding` feature, the encoding is sniffed from the first bytes
  using the detection table of the XML specification appendix (restricted
  to what [`encoding_rs`] supports: UTF-8 and UTF-16LE/BE), and the
  `encoding=` pseudo-attribute of the XML declaration can switch an
  ASCII-compatible assumption over to the declared encoding.

Both variants work incrementally: partial BOMs and partial code units at
chunk boundaries are carried over to the next chunk.
*/
use std::borrow::Cow;

#[cfg(feature = "encoding")]
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

#[cfg(feature = "encoding")]
use crate::error::{Error, Result};

const UTF8_BOM: &'static [u8] = b"\xef\xbb\xbf";

/// Strip a leading UTF-8 byte-order mark from a chunked stream.
///
/// This is the whole of the decoding layer when the `encoding` feature is
/// disabled.
pub struct BomStripper {
	/// Bytes held back because they may be the start of a BOM.
	held: usize,
	done: bool,
}

impl BomStripper {
	pub fn new() -> Self {
		Self {
			held: 0,
			done: false,
		}
	}

	/// Process one chunk, returning the bytes which should reach the
	/// lexer.
	///
	/// At most one chunk can be held back entirely (when it is a strict
	/// prefix of the BOM); the held prefix is accounted through `self` and
	/// never returned.
	pub fn feed<'a>(&mut self, data: Cow<'a, [u8]>) -> Option<Cow<'a, [u8]>> {
		if self.done {
			return Some(data);
		}
		// we are within the first three bytes of the stream
		let start = self.held;
		let mut matched = start;
		for (i, b) in data.iter().enumerate() {
			if matched >= UTF8_BOM.len() || UTF8_BOM[matched] != *b {
				break;
			}
			matched += 1;
			if matched == UTF8_BOM.len() {
				// full BOM; drop it
				self.done = true;
				let rest = i + 1;
				return match data {
					Cow::Borrowed(b) => Some(Cow::Borrowed(&b[rest..])),
					Cow::Owned(mut v) => {
						v.drain(..rest);
						Some(Cow::Owned(v))
					}
				};
			}
		}
		if matched - start == data.len() {
			// the entire chunk is a BOM prefix; hold it
			self.held = matched;
			return None;
		}
		self.done = true;
		if start > 0 {
			// the held prefix turned out not to be a BOM; reinsert it
			let mut v = Vec::with_capacity(start + data.len());
			v.extend_from_slice(&UTF8_BOM[..start]);
			v.extend_from_slice(&data);
			Some(Cow::Owned(v))
		} else {
			Some(data)
		}
	}
}

/// Automatic encoding detection based on the table in appendix F of the
/// XML specification, restricted to the encodings [`encoding_rs`]
/// supports.
///
/// Returns `None` when the bytes match no known pattern (which means
/// "UTF-8 without a declaration" for a well-formed document).
#[cfg(feature = "encoding")]
pub fn detect_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
	match bytes {
		// with BOM
		_ if bytes.starts_with(&[0xFE, 0xFF]) => Some(UTF_16BE),
		_ if bytes.starts_with(&[0xFF, 0xFE]) => Some(UTF_16LE),
		_ if bytes.starts_with(UTF8_BOM) => Some(UTF_8),

		// without BOM
		_ if bytes.starts_with(&[0x00, b'<', 0x00, b'?']) => Some(UTF_16BE),
		_ if bytes.starts_with(&[b'<', 0x00, b'?', 0x00]) => Some(UTF_16LE),
		_ if bytes.starts_with(&[b'<', b'?', b'x', b'm']) => Some(UTF_8),

		_ => None,
	}
}

/// How many bytes are needed before detection can be considered final.
#[cfg(feature = "encoding")]
const SNIFF_LEN: usize = 4;

/**
# Incremental transcoder to UTF-8

Buffers the first few bytes for detection, then streams everything through
an [`encoding_rs`] decoder. The declared encoding from the XML declaration
may be applied with [`Transcoder::declare`] while the initial assumption
was an ASCII-compatible one.
*/
#[cfg(feature = "encoding")]
pub struct Transcoder {
	decoder: Option<encoding_rs::Decoder>,
	encoding: Option<&'static Encoding>,
	sniff: Vec<u8>,
	/// True once bytes went through the decoder; forbids late switching.
	committed: bool,
}

#[cfg(feature = "encoding")]
impl Transcoder {
	pub fn new() -> Self {
		Self {
			decoder: None,
			encoding: None,
			sniff: Vec::with_capacity(SNIFF_LEN),
			committed: false,
		}
	}

	/// The encoding currently in effect, if decided already.
	pub fn encoding(&self) -> Option<&'static Encoding> {
		self.encoding
	}

	/// Apply the encoding name from the XML declaration.
	///
	/// Ignored when the stream was detected as UTF-16 (the pattern is
	/// unambiguous there) or when the label is unknown; in the latter case
	/// an error is returned.
	pub fn declare(&mut self, label: &str) -> Result<()> {
		let enc = match Encoding::for_label(label.as_bytes()) {
			Some(enc) => enc,
			None => return Err(Error::LimitExceeded("unknown encoding label")),
		};
		let current = match self.encoding {
			Some(e) => e,
			None => UTF_8,
		};
		if current == UTF_16LE || current == UTF_16BE {
			// the byte pattern already decided
			return Ok(());
		}
		if enc == current {
			return Ok(());
		}
		if !enc.is_ascii_compatible() {
			return Err(Error::LimitExceeded("unsupported encoding switch"));
		}
		// switch for everything after the declaration; the bytes decoded
		// so far were ASCII, which is identical in the two encodings
		self.encoding = Some(enc);
		self.decoder = Some(enc.new_decoder_without_bom_handling());
		Ok(())
	}

	fn ensure_decoder(&mut self) {
		if self.decoder.is_none() {
			let enc = self
				.encoding
				.unwrap_or_else(|| detect_encoding(&self.sniff).unwrap_or(UTF_8));
			self.encoding = Some(enc);
			self.decoder = Some(enc.new_decoder());
		}
	}

	fn run_decoder(&mut self, bytes: &[u8], last: bool, out: &mut String) -> Result<()> {
		self.committed = self.committed || bytes.len() > 0;
		let decoder = self.decoder.as_mut().unwrap();
		out.reserve(
			decoder
				.max_utf8_buffer_length(bytes.len())
				.unwrap_or(bytes.len() * 3 + 16),
		);
		let (result, _read, had_errors) = decoder.decode_to_string(bytes, out, last);
		debug_assert!(matches!(result, encoding_rs::CoderResult::InputEmpty));
		if had_errors {
			return Err(Error::InvalidChar(0xfffd));
		}
		Ok(())
	}

	/// Transcode one chunk.
	///
	/// `last` must be set on the final chunk so that truncated code units
	/// are reported.
	pub fn feed(&mut self, data: &[u8], last: bool) -> Result<String> {
		let mut out = String::new();
		if self.decoder.is_none() && !self.committed {
			// still sniffing
			self.sniff.extend_from_slice(data);
			if self.sniff.len() < SNIFF_LEN && !last {
				return Ok(out);
			}
			self.ensure_decoder();
			let buffered = std::mem::take(&mut self.sniff);
			self.run_decoder(&buffered, last, &mut out)?;
			return Ok(out);
		}
		self.ensure_decoder();
		self.run_decoder(data, last, &mut out)?;
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn feed_all(chunks: &[&[u8]]) -> Vec<u8> {
		let mut stripper = BomStripper::new();
		let mut out = Vec::new();
		for chunk in chunks {
			if let Some(data) = stripper.feed(Cow::Borrowed(*chunk)) {
				out.extend_from_slice(&data);
			}
		}
		out
	}

	#[test]
	fn bom_stripper_strips_leading_bom() {
		assert_eq!(feed_all(&[b"\xef\xbb\xbf<r/>"]), b"<r/>");
	}

	#[test]
	fn bom_stripper_passes_plain_data() {
		assert_eq!(feed_all(&[b"<r/>"]), b"<r/>");
	}

	#[test]
	fn bom_stripper_handles_bom_split_across_chunks() {
		assert_eq!(feed_all(&[b"\xef", b"\xbb", b"\xbf<r/>"]), b"<r/>");
	}

	#[test]
	fn bom_stripper_reinserts_false_bom_prefix() {
		// 0xef 0xbf is not a BOM prefix continuation
		assert_eq!(feed_all(&[b"\xef", b"\xbf\xbf"]), b"\xef\xbf\xbf");
	}

	#[cfg(feature = "encoding")]
	mod transcoding {
		use super::*;

		#[test]
		fn detects_utf16le_bom() {
			assert_eq!(detect_encoding(b"\xff\xfe<\x00"), Some(UTF_16LE));
		}

		#[test]
		fn detects_utf16be_without_bom() {
			assert_eq!(detect_encoding(b"\x00<\x00?"), Some(UTF_16BE));
		}

		#[test]
		fn transcodes_utf16le() {
			let mut tc = Transcoder::new();
			let mut data = Vec::new();
			data.extend_from_slice(b"\xff\xfe");
			for b in "<r/>".encode_utf16() {
				data.extend_from_slice(&b.to_le_bytes());
			}
			let mut out = String::new();
			out.push_str(&tc.feed(&data, true).unwrap());
			assert_eq!(out, "<r/>");
		}

		#[test]
		fn transcodes_incrementally_across_code_units() {
			let mut tc = Transcoder::new();
			let mut data = Vec::new();
			data.extend_from_slice(b"\xff\xfe");
			for b in "<r a='\u{e4}'/>".encode_utf16() {
				data.extend_from_slice(&b.to_le_bytes());
			}
			let mut out = String::new();
			// feed in 1-byte chunks, splitting every code unit
			for (i, chunk) in data.chunks(1).enumerate() {
				let last = i == data.len() - 1;
				out.push_str(&tc.feed(chunk, last).unwrap());
			}
			assert_eq!(out, "<r a='\u{e4}'/>");
		}

		#[test]
		fn declared_encoding_switches_ascii_compatible() {
			let mut tc = Transcoder::new();
			let prefix = tc.feed(b"<?xml version='1.0' encoding='iso-8859-1'?>", false)
				.unwrap();
			assert_eq!(prefix, "<?xml version='1.0' encoding='iso-8859-1'?>");
			tc.declare("iso-8859-1").unwrap();
			// 0xe4 is ä in latin-1 and invalid alone in utf-8
			let out = tc.feed(b"<r a='\xe4'/>", true).unwrap();
			assert_eq!(out, "<r a='\u{e4}'/>");
		}

		#[test]
		fn unknown_label_is_rejected() {
			let mut tc = Transcoder::new();
			tc.feed(b"<?xm", false).unwrap();
			assert!(tc.declare("no-such-encoding").is_err());
		}
	}
}
