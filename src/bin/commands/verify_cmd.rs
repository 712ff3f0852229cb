use anyhow::Result;
use mmdbio::verify::verify_file;
use std::path::PathBuf;

pub fn cmd_verify(db: PathBuf) -> Result<()> {
    let report = match verify_file(&db) {
        Ok(report) => report,
        Err(e) => {
            println!("invalid: failed to open MMDB: {}", e);
            std::process::exit(1);
        }
    };

    for warning in &report.warnings {
        log::warn!("{}", warning);
    }
    for info in &report.info {
        log::debug!("{}", info);
    }

    match report.first_error() {
        None => {
            println!("valid");
            Ok(())
        }
        Some(reason) => {
            println!("invalid: {}", reason);
            std::process::exit(1);
        }
    }
}
