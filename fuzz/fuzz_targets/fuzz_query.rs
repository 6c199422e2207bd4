#![no_main]
use libfuzzer_sys::fuzz_target;

const MAX_QUERY_LENGTH: usize = 10000;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let input: String = input.chars().take(MAX_QUERY_LENGTH).collect();
        lucene_expr::fuzz_helper::check_query(&input);
    }
});
