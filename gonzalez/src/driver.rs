/*!
Wrappers around lexers and parsers to drive them.

For high-level parsing, [`FeedParser`] and [`PullParser`] are the things to
look at; a [`SaxDriver`](crate::parser::SaxDriver) can be put on top of
either. More information and examples can also be found in the top-level
crate documentation.
*/

use std::io;

use crate::bufq::BufferQueue;
use crate::context::{Context, RcPtr};
use crate::encoding::BomStripper;
use crate::error::{Error, Result};
use crate::lexer::{Lexer, LexerOptions};
use crate::parser;
use crate::parser::{
	EntityResolver, LexerAdapter, Parse, Parser, ParserOptions, RawParser, WithOptions,
};

/**
# Source for individual XML events

This trait is implemented by the different parser frontends. It is
analogous to the [`std::io::Read`] trait, but for XML document events
instead of bytes.
*/
pub trait EventRead {
	type Output;

	/// Read a single event from the parser.
	///
	/// If the EOF has been reached with a valid document, `None` is
	/// returned.
	///
	/// I/O errors may be retried, all other errors are fatal (and will be
	/// returned again by the parser on the next invocation without reading
	/// further data from the source).
	fn read(&mut self) -> Result<Option<Self::Output>>;

	/// Read all events which can be produced from the data source (at
	/// this point in time).
	///
	/// The given `cb` is invoked for each event.
	///
	/// I/O errors may be retried, all other errors are fatal (and will be
	/// returned again by the parser on the next invocation without reading
	/// further data from the source).
	fn read_all<F>(&mut self, mut cb: F) -> Result<()>
	where
		F: FnMut(Self::Output) -> (),
	{
		loop {
			match self.read()? {
				None => return Ok(()),
				Some(ev) => cb(ev),
			}
		}
	}

	/// Read all events which can be produced from the data source (at
	/// this point in time).
	///
	/// The given `cb` is invoked for each event.
	///
	/// If the data source indicates that it needs to block to read further
	/// data, `false` is returned. If the EOF is reached successfully,
	/// `true` is returned.
	fn read_all_eof<F>(&mut self, cb: F) -> Result<bool>
	where
		F: FnMut(Self::Output) -> (),
	{
		as_eof_flag(self.read_all(cb))
	}
}

/// Convert end-of-file-ness of a result to a boolean flag.
///
/// If the result is ok, return true (EOF). If the result is not ok, but
/// the error is an I/O error indicating that the data source would have to
/// block to read further data, return false ("Ok, but not at eof yet").
///
/// All other errors are passed through.
pub fn as_eof_flag(r: Result<()>) -> Result<bool> {
	match r {
		Err(Error::IO(ioerr)) if ioerr.kind() == io::ErrorKind::WouldBlock => Ok(false),
		Err(e) => Err(e),
		Ok(()) => Ok(true),
	}
}

/// Decoding front of a [`PushDriver`].
enum Prefilter {
	Plain(BomStripper),
	#[cfg(feature = "encoding")]
	Transcode(crate::encoding::Transcoder),
}

/// The lexer-level options implied by a set of [`ParserOptions`].
fn lexer_options_for(opts: &ParserOptions) -> LexerOptions {
	LexerOptions::default()
		.accept_xml_1_1(opts.xml_1_1)
		.external_general_entities(opts.external_general_entities)
		.external_parameter_entities(opts.external_parameter_entities)
}

/**
# Non-blocking driver for parsers

This is a generic non-blocking push-based driver for objects implementing
the [`Parse`] trait.

In general, it is advised to use the [`FeedParser`] alias which
specializes this struct for use with the default [`Parser`].
*/
pub struct PushDriver<'x, P: Parse> {
	token_source: LexerAdapter<BufferQueue<'x>>,
	parser: P,
	prefilter: Prefilter,
	#[cfg(feature = "encoding")]
	encoding_declared: bool,
}

impl<'x, P: Parse + Default> Default for PushDriver<'x, P> {
	/// Create a new push driver using the defaults for its parser and
	/// lexer.
	fn default() -> Self {
		Self::wrap(Lexer::new(), P::default())
	}
}

impl<'x, P: Parse + Default> PushDriver<'x, P> {
	/// Create a new push driver with default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a new push driver while configuring the lexer with the
	/// given options.
	pub fn with_lexer_options(options: LexerOptions) -> Self {
		Self::wrap(Lexer::with_options(options), P::default())
	}
}

impl<'x, P: Parse + WithOptions> PushDriver<'x, P> {
	/// Create a new push driver honoring the given [`ParserOptions`] in
	/// both the lexer and the parser.
	pub fn with_options(opts: ParserOptions) -> Self {
		let lexer = Lexer::with_options(lexer_options_for(&opts));
		Self::wrap(lexer, P::with_options(opts))
	}
}

impl<'x, P: Parse + parser::WithContext> parser::WithContext for PushDriver<'x, P> {
	/// Create a new PushDriver, using the given context for the parser.
	fn with_context(ctx: RcPtr<Context>) -> Self {
		Self::wrap(Lexer::new(), P::with_context(ctx))
	}
}

impl<'x, P: Parse> PushDriver<'x, P> {
	/// Compose a new PushDriver from parts
	pub fn wrap(lexer: Lexer, parser: P) -> Self {
		Self {
			token_source: LexerAdapter::new(lexer, BufferQueue::new()),
			parser,
			prefilter: Prefilter::Plain(BomStripper::new()),
			#[cfg(feature = "encoding")]
			encoding_declared: false,
		}
	}

	/// Compose a new PushDriver which transcodes its input to UTF-8.
	///
	/// The encoding is sniffed from the first bytes of the stream and
	/// switched over when the XML declaration names one, as long as the
	/// switch happens before the bytes following the declaration have been
	/// fed.
	#[cfg(feature = "encoding")]
	pub fn decoding(lexer: Lexer, parser: P) -> Self {
		Self {
			token_source: LexerAdapter::new(lexer, BufferQueue::new()),
			parser,
			prefilter: Prefilter::Transcode(crate::encoding::Transcoder::new()),
			#[cfg(feature = "encoding")]
			encoding_declared: false,
		}
	}

	/// Feed a chunk of data to the parser.
	///
	/// This enqueues the data for processing, but does not process it
	/// right away.
	///
	/// To process data, call [`read()`] or [`read_all()`].
	///
	/// # Panics
	///
	/// If [`feed_eof()`] has been called before.
	///
	///    [`read()`]: EventRead::read
	///    [`read_all()`]: EventRead::read_all
	///    [`feed_eof()`]: Self::feed_eof()
	pub fn feed<'a: 'x, T: Into<std::borrow::Cow<'a, [u8]>>>(&mut self, data: T) -> Result<()> {
		self.apply_declared_encoding()?;
		match &mut self.prefilter {
			Prefilter::Plain(stripper) => {
				if let Some(data) = stripper.feed(data.into()) {
					self.token_source.get_mut().push(data);
				}
				Ok(())
			}
			#[cfg(feature = "encoding")]
			Prefilter::Transcode(tc) => {
				let decoded = tc.feed(&data.into(), false)?;
				if !decoded.is_empty() {
					self.token_source.get_mut().push(decoded.into_bytes());
				}
				Ok(())
			}
		}
	}

	/// Feed the eof marker to the parser.
	///
	/// This is a prerequisite for parsing to terminate with an eof signal
	/// (returning `true`). Otherwise, `false` will be returned
	/// indefinitely without emitting any events.
	///
	/// After the eof marker has been fed to the parser, no further data
	/// can be fed.
	pub fn feed_eof(&mut self) -> Result<()> {
		match &mut self.prefilter {
			Prefilter::Plain(_) => (),
			#[cfg(feature = "encoding")]
			Prefilter::Transcode(tc) => {
				let decoded = tc.feed(&[], true)?;
				if !decoded.is_empty() {
					self.token_source.get_mut().push(decoded.into_bytes());
				}
			}
		}
		self.token_source.get_mut().push_eof();
		Ok(())
	}

	/// Hand the encoding name from the XML declaration over to the
	/// transcoder, once it is available.
	#[cfg(feature = "encoding")]
	fn apply_declared_encoding(&mut self) -> Result<()> {
		if self.encoding_declared {
			return Ok(());
		}
		let declared = match self.token_source.get_lexer().declared_encoding() {
			Some(enc) => enc.to_cdata(),
			None => return Ok(()),
		};
		self.encoding_declared = true;
		if let Prefilter::Transcode(tc) = &mut self.prefilter {
			tc.declare(&declared)?;
		}
		Ok(())
	}

	#[cfg(not(feature = "encoding"))]
	fn apply_declared_encoding(&mut self) -> Result<()> {
		Ok(())
	}

	/// Return the amount of bytes which have not been read from the
	/// buffer yet.
	pub fn buffered(&self) -> usize {
		self.token_source.get_ref().len()
	}

	/// Return a mutable reference to the internal BufferQueue
	///
	/// This can be used to force dropping of all memory in case of error
	/// conditions.
	pub fn get_buffer_mut(&mut self) -> &mut BufferQueue<'x> {
		self.token_source.get_mut()
	}

	/// Access the lexer
	pub fn get_lexer(&self) -> &Lexer {
		self.token_source.get_lexer()
	}

	/// Access the lexer, mutably
	pub fn get_lexer_mut(&mut self) -> &mut Lexer {
		self.token_source.get_lexer_mut()
	}

	/// Access the parser
	pub fn get_parser(&self) -> &P {
		&self.parser
	}

	/// Access the parser, mutably
	pub fn get_parser_mut(&mut self) -> &mut P {
		&mut self.parser
	}

	/// Install a resolver for external entities.
	///
	/// Only consulted when the external-entity options are enabled (see
	/// [`ParserOptions::external_general_entities`]); with the options on
	/// but no resolver installed, external entities are skipped.
	pub fn set_entity_resolver(&mut self, resolver: Box<dyn EntityResolver>) {
		self.token_source
			.get_lexer_mut()
			.set_entity_resolver(resolver);
	}

	/// Release all temporary buffers
	///
	/// This is sensible to call when it is expected that no more data
	/// will be processed by the parser for a while and the memory is
	/// better used elsewhere.
	pub fn release_temporaries(&mut self) {
		self.token_source.get_lexer_mut().release_temporaries();
		self.parser.release_temporaries();
	}
}

impl<P: Parse> EventRead for PushDriver<'_, P> {
	type Output = P::Output;

	/// Read a single event from the parser.
	///
	/// If the EOF has been reached with a valid document, `None` is
	/// returned.
	///
	/// If the buffered data is not sufficient to create an event, an I/O
	/// error of [`std::io::ErrorKind::WouldBlock`] is returned.
	fn read(&mut self) -> Result<Option<Self::Output>> {
		self.parser.parse(&mut self.token_source)
	}
}

/**
# Blocking driver for parsers

This is a generic blocking pull-based driver for objects implementing the
[`Parse`] trait.

In general, it is advised to use the [`PullParser`] alias which
specializes this struct for use with the default [`Parser`].
*/
pub struct PullDriver<T: io::BufRead, P: Parse> {
	parser: P,
	token_source: LexerAdapter<T>,
}

impl<T: io::BufRead, P: Parse + Default> PullDriver<T, P> {
	/// Create a new parser with default options, wrapping the given
	/// reader.
	pub fn new(inner: T) -> Self {
		Self::with_options(inner, LexerOptions::default())
	}

	/// Create a new parser while configuring the lexer with the given
	/// options.
	pub fn with_options(inner: T, options: LexerOptions) -> Self {
		Self::wrap(inner, Lexer::with_options(options), P::default())
	}
}

impl<T: io::BufRead, P: Parse + WithOptions> PullDriver<T, P> {
	/// Create a new parser honoring the given [`ParserOptions`] in both
	/// the lexer and the parser.
	pub fn with_parser_options(inner: T, opts: ParserOptions) -> Self {
		let lexer = Lexer::with_options(lexer_options_for(&opts));
		Self::wrap(inner, lexer, P::with_options(opts))
	}
}

impl<T: io::BufRead, P: Parse> PullDriver<T, P> {
	/// Create a fully customized parser from a lexer and a parser
	/// component.
	pub fn wrap(inner: T, lexer: Lexer, parser: P) -> Self {
		Self {
			token_source: LexerAdapter::new(lexer, inner),
			parser,
		}
	}

	/// Access the inner BufRead
	pub fn get_inner(&self) -> &T {
		self.token_source.get_ref()
	}

	/// Access the inner BufRead, mutably
	pub fn get_inner_mut(&mut self) -> &mut T {
		self.token_source.get_mut()
	}

	/// Access the lexer
	pub fn get_lexer(&self) -> &Lexer {
		self.token_source.get_lexer()
	}

	/// Access the lexer, mutably
	pub fn get_lexer_mut(&mut self) -> &mut Lexer {
		self.token_source.get_lexer_mut()
	}

	/// Access the parser
	pub fn get_parser(&self) -> &P {
		&self.parser
	}

	/// Access the parser, mutably
	pub fn get_parser_mut(&mut self) -> &mut P {
		&mut self.parser
	}

	/// Install a resolver for external entities.
	///
	/// Only consulted when the external-entity options are enabled; with
	/// the options on but no resolver installed, external entities are
	/// skipped.
	pub fn set_entity_resolver(&mut self, resolver: Box<dyn EntityResolver>) {
		self.token_source
			.get_lexer_mut()
			.set_entity_resolver(resolver);
	}
}

impl<T: io::BufRead, P: Parse> EventRead for PullDriver<T, P> {
	type Output = P::Output;

	/// Read a single event from the parser.
	///
	/// If the EOF has been reached with a valid document, `None` is
	/// returned.
	///
	/// All I/O errors from the source are passed on without modification.
	fn read(&mut self) -> Result<Option<Self::Output>> {
		self.parser.parse(&mut self.token_source)
	}
}

/**
# Non-blocking parsing

The [`FeedParser`] allows parsing XML documents as they arrive in the
application, giving back control to the caller immediately when not enough
data is available for processing. This is especially useful when streaming
data from sockets.

To read events from the `FeedParser` after feeding data, use its
[`EventRead`] trait.

## Example

```
use gonzalez::{FeedParser, Error, ResolvedEvent, EventRead};
use std::io;
let doc = b"<?xml version='1.0'?><hello>World!</hello>";
let mut fp = FeedParser::new();
fp.feed(&doc[..10]).unwrap();
// a WouldBlock, because the XML declaration is not complete yet
let ev = fp.read();
assert!(matches!(
	ev.err().unwrap(),
	Error::IO(e) if e.kind() == io::ErrorKind::WouldBlock
));

fp.feed(&doc[10..25]).unwrap();
// now the XML declaration is complete
let ev = fp.read();
assert!(matches!(ev.unwrap().unwrap(), ResolvedEvent::XmlDeclaration(..)));
```
*/
pub type FeedParser<'x> = PushDriver<'x, Parser>;

/// Non-blocking parsing without namespace resolution.
pub type RawFeedParser<'x> = PushDriver<'x, RawParser>;

/**
# Blocking parsing

The [`PullParser`] allows parsing XML documents from a [`io::BufRead`]
blockingly. The parser will block until the backing reader has enough data
available (or returns an error).

Interaction with a `PullParser` should happen exclusively via the
[`EventRead`] trait.

## Blocking I/O

If the `PullParser` is used with blocking I/O and a source which may block
for a significant amount of time (e.g. a network socket), some events may
be emitted with significant delay. This is due to an edge case where the
lexer may emit a token without consuming a byte from the source, which
most importantly affects closing element tags. For networked operation the
[`FeedParser`] is recommended instead.

## Example

```
use gonzalez::{PullParser, ResolvedEvent, EventRead};
let mut doc = &b"<?xml version='1.0'?><hello>World!</hello>"[..];
let mut pp = PullParser::new(&mut doc);
let ev = pp.read();
assert!(matches!(ev.unwrap().unwrap(), ResolvedEvent::XmlDeclaration(..)));
```
*/
pub type PullParser<T> = PullDriver<T, Parser>;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::ResolvedEvent;

	#[test]
	fn feed_parser_roundtrip() {
		let doc = b"<?xml version='1.0'?><hello a='b'>World!</hello>";
		let mut fp = FeedParser::new();
		fp.feed(doc.to_vec()).unwrap();
		fp.feed_eof().unwrap();
		let mut evs = Vec::new();
		let eof = fp.read_all_eof(|ev| evs.push(ev)).unwrap();
		assert!(eof);
		assert!(matches!(&evs[0], ResolvedEvent::XmlDeclaration(..)));
		assert!(
			matches!(&evs[1], ResolvedEvent::StartElement(_, (None, nm), attrs, _) if nm == "hello" && attrs.len() == 1)
		);
		assert!(matches!(&evs[2], ResolvedEvent::Text(_, t) if t == "World!"));
		assert!(matches!(&evs[3], ResolvedEvent::EndElement(_)));
	}

	#[test]
	fn feed_parser_handles_chunked_input() {
		let doc: &[u8] = b"<r><c>text</c><c2 x='y'/></r>";
		let mut oneshot = Vec::new();
		{
			let mut fp = FeedParser::new();
			fp.feed(doc.to_vec()).unwrap();
			fp.feed_eof().unwrap();
			fp.read_all(|ev| oneshot.push(ev)).unwrap();
		}
		let mut chunked = Vec::new();
		{
			let mut fp = FeedParser::new();
			for chunk in doc.chunks(1) {
				fp.feed(chunk.to_vec()).unwrap();
				match fp.read_all(|ev| chunked.push(ev)) {
					Ok(()) => panic!("eof before feed_eof"),
					Err(Error::IO(e)) if e.kind() == io::ErrorKind::WouldBlock => (),
					Err(e) => panic!("unexpected error: {:?}", e),
				}
			}
			fp.feed_eof().unwrap();
			fp.read_all(|ev| chunked.push(ev)).unwrap();
		}
		assert_eq!(oneshot, chunked);
	}

	#[test]
	fn feed_parser_strips_bom() {
		let mut fp = FeedParser::new();
		fp.feed(&b"\xef\xbb\xbf<r/>"[..]).unwrap();
		fp.feed_eof().unwrap();
		let mut evs = Vec::new();
		fp.read_all(|ev| evs.push(ev)).unwrap();
		assert!(matches!(&evs[0], ResolvedEvent::StartElement(..)));
	}

	#[test]
	fn pull_parser_reads_to_eof() {
		let mut doc = &b"<r>text</r>"[..];
		let mut pp = PullParser::new(&mut doc);
		let mut evs = Vec::new();
		pp.read_all(|ev| evs.push(ev)).unwrap();
		assert_eq!(evs.len(), 3);
	}

	#[test]
	fn feed_parser_resolves_external_entities_with_resolver() {
		use crate::parser::InputSource;
		use crate::strings::CDataStr;

		struct FixedResolver;

		impl EntityResolver for FixedResolver {
			fn resolve(
				&mut self,
				_public_id: Option<&CDataStr>,
				system_id: &CDataStr,
			) -> crate::error::Result<Option<InputSource>> {
				assert_eq!(&**system_id, "ext.txt");
				Ok(Some(InputSource {
					system_id: system_id.to_cdata(),
					reader: Box::new(&b"EXT"[..]),
				}))
			}
		}

		let opts = ParserOptions {
			external_general_entities: true,
			..ParserOptions::default()
		};
		let mut fp = FeedParser::with_options(opts);
		fp.set_entity_resolver(Box::new(FixedResolver));
		fp.feed(&b"<!DOCTYPE r [<!ENTITY x SYSTEM 'ext.txt'>]><r>&x;</r>"[..])
			.unwrap();
		fp.feed_eof().unwrap();
		let mut evs = Vec::new();
		fp.read_all(|ev| evs.push(ev)).unwrap();
		assert!(evs
			.iter()
			.any(|ev| matches!(ev, ResolvedEvent::EntityStart(_, n) if n == "x")));
		assert!(evs
			.iter()
			.any(|ev| matches!(ev, ResolvedEvent::Text(_, t) if t == "EXT")));
		assert!(evs
			.iter()
			.any(|ev| matches!(ev, ResolvedEvent::EntityEnd(_))));
		assert!(!evs
			.iter()
			.any(|ev| matches!(ev, ResolvedEvent::SkippedEntity(..))));
	}

	#[test]
	fn feed_parser_skips_external_entities_without_resolver() {
		// the option alone does not fetch anything
		let opts = ParserOptions {
			external_general_entities: true,
			..ParserOptions::default()
		};
		let mut fp = FeedParser::with_options(opts);
		fp.feed(&b"<!DOCTYPE r [<!ENTITY x SYSTEM 'ext.txt'>]><r>&x;</r>"[..])
			.unwrap();
		fp.feed_eof().unwrap();
		let mut evs = Vec::new();
		fp.read_all(|ev| evs.push(ev)).unwrap();
		assert!(evs
			.iter()
			.any(|ev| matches!(ev, ResolvedEvent::SkippedEntity(_, n) if n == "x")));
	}

	#[cfg(feature = "encoding")]
	#[test]
	fn feed_parser_decodes_utf16() {
		let mut data = Vec::new();
		data.extend_from_slice(b"\xff\xfe");
		for u in "<r a='x'/>".encode_utf16() {
			data.extend_from_slice(&u.to_le_bytes());
		}
		let mut fp = FeedParser::decoding(Lexer::new(), Parser::new());
		fp.feed(data).unwrap();
		fp.feed_eof().unwrap();
		let mut evs = Vec::new();
		fp.read_all(|ev| evs.push(ev)).unwrap();
		assert!(matches!(&evs[0], ResolvedEvent::StartElement(..)));
	}
}
