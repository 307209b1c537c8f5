#![no_main]

use dry::{ErrorMode, Options};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    for mode in [ErrorMode::Lax, ErrorMode::Warn, ErrorMode::Strict] {
        let engine = dry::Engine::with_options(Options::builder().error_mode(mode).build());
        if let Err(err) = engine.parse(data) {
            // Formatting must not panic on any span.
            let _ = format!("{err} {err:#}");
        }
    }
});
