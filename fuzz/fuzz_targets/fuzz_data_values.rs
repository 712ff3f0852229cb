#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdbio::data_section::DataDecoder;

fuzz_target!(|data: &[u8]| {
    // Decode from every offset of an arbitrary data section
    let decoder = DataDecoder::new(data);
    for offset in 0..data.len().min(256) {
        if let Ok(value) = decoder.decode(offset as u32) {
            let _ = mmdbio::json::to_json(&value);
        }
    }
});
