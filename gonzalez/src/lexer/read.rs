use super::ranges::ByteSelect;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Endbyte {
	Eof,
	Limit,
	Delimiter(u8),
}

fn find_first_not<B: ByteSelect>(src: &[u8], s: &B) -> Option<usize> {
	for (i, b) in src.iter().enumerate() {
		if !s.select(*b) {
			return Some(i);
		}
	}
	None
}

/// Copy bytes matching the selector from the front of `r` into `into`,
/// limited to `limit` bytes, advancing `r` past everything consumed.
///
/// The first non-matching byte is consumed, too, and returned as
/// `Endbyte::Delimiter`.
pub fn read_validated_bytes<B: ByteSelect>(
	r: &mut &[u8],
	selector: &B,
	limit: usize,
	into: &mut Vec<u8>,
) -> Endbyte {
	let end_pos = match find_first_not(*r, selector) {
		None => r.len().min(limit),
		Some(p) => p.min(limit),
	};
	let (prefix, delim_suffix) = r.split_at(end_pos);
	into.extend_from_slice(prefix);
	if delim_suffix.len() > 0 {
		// we have a delimiter or hit the length limit; check which
		let b = delim_suffix[0];
		if !selector.select(b) {
			*r = &delim_suffix[1..];
			Endbyte::Delimiter(b)
		} else {
			*r = delim_suffix;
			Endbyte::Limit
		}
	} else {
		*r = &[];
		Endbyte::Eof
	}
}

/// Advance `r` past bytes matching the selector without copying them.
///
/// Returns the number of bytes skipped together with the end condition.
pub fn skip_matching_bytes<B: ByteSelect>(r: &mut &[u8], selector: &B) -> (usize, Endbyte) {
	let end_pos = match find_first_not(*r, selector) {
		None => r.len(),
		Some(p) => p,
	};
	let (_, delim_suffix) = r.split_at(end_pos);
	if delim_suffix.len() > 0 {
		let b = delim_suffix[0];
		debug_assert!(!selector.select(b));
		*r = &delim_suffix[1..];
		(end_pos, Endbyte::Delimiter(b))
	} else {
		*r = &[];
		(end_pos, Endbyte::Eof)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::ranges::AnyByte;

	#[test]
	fn read_validated_bytes_limits() {
		let mut s1 = &b"foobar2342"[..];
		let mut out = Vec::new();
		let result = read_validated_bytes(&mut s1, &AnyByte(), 6, &mut out);
		assert!(matches!(result, Endbyte::Limit));
		assert_eq!(out, b"foobar".to_vec());
		assert_eq!(s1.len(), 4);
	}

	#[test]
	fn read_validated_bytes_handles_eof() {
		let mut s1 = &b"foobar2342"[..];
		let mut out = Vec::new();
		let result = read_validated_bytes(&mut s1, &AnyByte(), 128, &mut out);
		assert!(matches!(result, Endbyte::Eof));
		assert_eq!(out, b"foobar2342".to_vec());
		assert_eq!(s1.len(), 0);
	}

	#[test]
	fn read_validated_bytes_returns_delimiter() {
		let mut s1 = &b"fffnord"[..];
		let mut out = Vec::new();
		let result = read_validated_bytes(&mut s1, &b'f', 128, &mut out);
		match result {
			Endbyte::Delimiter(b) if b == b'n' => (),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(out, b"fff".to_vec());
		assert_eq!(s1.len(), 3);
	}

	#[test]
	fn skip_matching_bytes_handles_eof() {
		let mut s1 = &b"foobar2342"[..];
		let (n, result) = skip_matching_bytes(&mut s1, &AnyByte());
		assert!(matches!(result, Endbyte::Eof));
		assert_eq!(n, 10);
		assert_eq!(s1.len(), 0);
	}

	#[test]
	fn skip_matching_bytes_returns_delimiter() {
		let mut s1 = &b"fffnord"[..];
		let (n, result) = skip_matching_bytes(&mut s1, &b'f');
		match result {
			Endbyte::Delimiter(b) if b == b'n' => (),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(n, 3);
		assert_eq!(s1.len(), 3);
	}
}
