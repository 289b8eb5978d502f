//! Feeds arbitrary UTF-8 documents to the analysis-result reader, then
//! rescales whatever parsed onto a fixed image size.

#![no_main]

use fieldbox::ir::io_analysis_json::from_analysis_str;
use fieldbox::ir::ImageDimensions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(result) = from_analysis_str(json) {
        let _ = result.to_pixel_space(ImageDimensions::new(640, 480));
    }
});
