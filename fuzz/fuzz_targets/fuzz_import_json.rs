#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdbio::{import_json, Database, WriterOptions};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(outcome) = import_json(text, &WriterOptions::default(), "fuzz") {
        let report = mmdbio::verify::verify_bytes(&outcome.database);
        assert!(report.is_valid(), "{:?}", report.errors);
        let db = Database::from_bytes(outcome.database).unwrap();
        let _ = mmdbio::Snapshot::from_database(&db);
    }
});
