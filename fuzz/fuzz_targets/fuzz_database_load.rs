#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Garbage input must produce errors, never panics
    let _ = mmdbio::verify::verify_bytes(data);

    if let Ok(db) = mmdbio::Database::from_bytes(data.to_vec()) {
        for entry in db.networks().take(1000) {
            if entry.is_err() {
                break;
            }
        }
        let _ = db.lookup("1.2.3.4".parse().unwrap());
        let _ = db.lookup("2001:db8::1".parse().unwrap());
    }
});
