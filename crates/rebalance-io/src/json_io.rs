use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::IoResult;

/// Deserialize a JSON document from `path`.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> IoResult<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}

/// Serialize `value` as pretty-printed JSON to `path`.
pub fn save_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
