#![no_main]
use libfuzzer_sys::fuzz_target;

use lucene_expr::Expression;

fuzz_target!(|e: Expression| {
    lucene_expr::fuzz_helper::check_tree(&e);
});
