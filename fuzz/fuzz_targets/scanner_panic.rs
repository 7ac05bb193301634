#![no_main]
use libfuzzer_sys::fuzz_target;
use std::path::Path;
use texpack_resolve::DirectiveScanner;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);

    // The tree must round-trip the input exactly.
    let parse = texpack_syntax::parse(&s);
    assert_eq!(parse.syntax().text().to_string(), s);

    for directive in DirectiveScanner::new(4).scan(Path::new("fuzz.tex"), &s) {
        assert!(directive.source_offset <= s.len());
    }
});
