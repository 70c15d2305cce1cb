use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
    Read,
    Seek,
    SeekFrom,
    Write,
};
use std::path::Path;
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

use crate::errors::{
    NmfError,
    Result,
};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    MessagePack,
    MessagePackZstd,
    Json,
}

impl FileFormat {
    /// Sniffs the format from the first bytes of the file.
    pub fn detect<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut buffer = [0u8; 4];
        let mut read = 0;
        while read < buffer.len() {
            let n = reader.read(&mut buffer[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        if read >= 4 && buffer == ZSTD_MAGIC {
            Ok(FileFormat::MessagePackZstd)
        } else if read >= 1 && (buffer[0] == b'{' || buffer[0] == b'[') {
            Ok(FileFormat::Json)
        } else {
            Ok(FileFormat::MessagePack)
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> NmfError + '_ {
    move |source| NmfError::Io {
        source,
        path: Some(path.to_path_buf()),
    }
}

/// Writes `data` as zstd-compressed MessagePack.
pub fn save_compressed<T: Serialize>(data: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_err(path))?;
    let mut encoder =
        Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL).map_err(io_err(path))?;
    rmp_serde::encode::write_named(&mut encoder, data)?;
    let mut writer = encoder.finish().map_err(io_err(path))?;
    writer.flush().map_err(io_err(path))?;
    Ok(())
}

/// Reads a file written by [`save_compressed`], or its uncompressed
/// MessagePack / JSON equivalents.
pub fn load_compressed<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(io_err(path))?;
    let format = FileFormat::detect(&mut file).map_err(io_err(path))?;
    file.seek(SeekFrom::Start(0)).map_err(io_err(path))?;
    let reader = BufReader::new(file);

    let out = match format {
        FileFormat::MessagePackZstd => {
            let decoder = Decoder::new(reader).map_err(io_err(path))?;
            rmp_serde::from_read(decoder)?
        }
        FileFormat::MessagePack => rmp_serde::from_read(reader)?,
        FileFormat::Json => serde_json::from_reader(reader).map_err(|e| NmfError::Serialization {
            msg: format!("{} ({})", e, path.display()),
        })?,
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Thing {
        name: String,
        values: Vec<f64>,
    }

    #[test]
    fn test_detect_formats() {
        let mut zstd_bytes: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD, 0x00];
        assert_eq!(
            FileFormat::detect(&mut zstd_bytes).unwrap(),
            FileFormat::MessagePackZstd
        );
        let mut json_bytes: &[u8] = b"{\"a\": 1}";
        assert_eq!(FileFormat::detect(&mut json_bytes).unwrap(), FileFormat::Json);
        let mut short: &[u8] = &[0x92];
        assert_eq!(
            FileFormat::detect(&mut short).unwrap(),
            FileFormat::MessagePack
        );
    }

    #[test]
    fn test_compressed_file_keeps_infinities() {
        let path = std::env::temp_dir().join("imsnmf_test_serde_roundtrip.msgpack.zst");
        let thing = Thing {
            name: "mins".to_string(),
            values: vec![1.0, f64::INFINITY, 0.5],
        };
        save_compressed(&thing, &path).unwrap();
        let loaded: Thing = load_compressed(&path).unwrap();
        assert_eq!(loaded, thing);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("imsnmf_test_does_not_exist.zst");
        let res: Result<Thing> = load_compressed(&path);
        assert!(matches!(res, Err(NmfError::Io { .. })));
    }
}
