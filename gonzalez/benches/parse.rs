use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use gonzalez::{EventRead, FeedParser};

fn build_document(elements: usize) -> Vec<u8> {
	let mut doc = Vec::new();
	doc.extend_from_slice(b"<?xml version='1.0'?><root xmlns:x='urn:bench'>");
	for i in 0..elements {
		doc.extend_from_slice(
			format!(
				"<item id='i{}' x:kind='bench'>payload text {} &amp; more</item>",
				i, i
			)
			.as_bytes(),
		);
	}
	doc.extend_from_slice(b"</root>");
	doc
}

fn parse_document(doc: &[u8]) -> usize {
	let mut fp = FeedParser::new();
	fp.feed(doc.to_vec()).unwrap();
	fp.feed_eof().unwrap();
	let mut count = 0usize;
	fp.read_all(|_| count += 1).unwrap();
	count
}

fn bench_parse(c: &mut Criterion) {
	let doc = build_document(1000);
	let mut group = c.benchmark_group("parse");
	group.throughput(Throughput::Bytes(doc.len() as u64));
	group.bench_function("document_1000_elements", |b| {
		b.iter(|| parse_document(&doc))
	});
	group.finish();
}

fn bench_xpath_compile(c: &mut Criterion) {
	let exprs = [
		"/root/item[@id = 'i500']/text()",
		"for $i in //item return $i/@id",
		"count(//item[position() mod 2 = 0])",
	];
	c.bench_function("xpath_compile", |b| {
		b.iter(|| {
			for expr in exprs.iter() {
				gonzalez::xpath::compile(expr, None).unwrap();
			}
		})
	});
}

criterion_group!(benches, bench_parse, bench_xpath_compile);
criterion_main!(benches);
