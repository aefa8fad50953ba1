use std::fs::File;
use std::io::Error;
use std::path::Path;

/// Writes an operations script with the standard header.
pub fn write_script(path: &Path, rows: &[[&str; 5]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["op", "user", "merchant", "amount", "order"])?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Generates a script of `rows` unit buys for a single user.
#[allow(dead_code)]
pub fn generate_buy_script(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["op", "user", "merchant", "amount", "order"])?;
    for _ in 0..rows {
        wtr.write_record(["buy", "u1", "", "1", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
