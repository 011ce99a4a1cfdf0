use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::grid::GridDescriptor;

/// Save indexes are searched from zero up to this bound.
pub const MAX_SAVE_INDEX: usize = 1_000_000;




/**
 * One channel of the state, in planar layout (x fastest), as written to a
 * `.cbor` file
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    pub index: usize,
    pub size: [usize; 3],
    pub data: Vec<f64>,
}




/**
 * The file for one channel at a save index: the channel name with spaces
 * replaced by underscores, followed by the index.
 */
pub fn channel_path(dir: &Path, name: &str, index: usize) -> PathBuf {
    dir.join(format!("{}{}.cbor", name.replace(' ', "_"), index))
}

/**
 * The first save index whose file for `first_channel` does not exist yet.
 */
pub fn next_save_index(dir: &Path, first_channel: &str) -> Result<usize> {
    (0..MAX_SAVE_INDEX)
        .find(|&i| !channel_path(dir, first_channel, i).exists())
        .ok_or_else(|| Error::Persistence(format!("no free save index in {}", dir.display())))
}

/**
 * Extract channel `channel` of a cell-major state into a planar vector.
 */
pub fn planar_channel(state: &[f64], num_states: usize, channel: usize) -> Vec<f64> {
    state.iter().skip(channel).step_by(num_states).cloned().collect()
}

/**
 * Write every channel of the state at the next free save index, one file
 * per channel. Returns the index used.
 */
pub fn save(dir: &Path, names: &[&str], grid: &GridDescriptor, state: &[f64]) -> Result<usize> {
    let first = names.first().ok_or_else(|| Error::Persistence("state has no channels".into()))?;
    std::fs::create_dir_all(dir)?;
    let index = next_save_index(dir, first)?;

    for (channel, name) in names.iter().enumerate() {
        let record = ChannelRecord {
            name: name.to_string(),
            index,
            size: grid.size(),
            data: planar_channel(state, names.len(), channel),
        };
        let path = channel_path(dir, name, index);
        write_record(&record, File::create(&path)?).map_err(|e| match e {
            Error::Persistence(message) => Error::Persistence(format!("{}: {}", path.display(), message)),
            other => other,
        })?;
        log::debug!("wrote {}", path.display());
    }
    Ok(index)
}

/**
 * Encode one record through a buffered writer. The buffer is flushed before
 * returning, so a failed final write is reported rather than lost on drop.
 */
pub fn write_record<W: Write>(record: &ChannelRecord, inner: W) -> Result<()> {
    let mut writer = BufWriter::new(inner);
    ciborium::ser::into_writer(record, &mut writer).map_err(|e| Error::Persistence(format!("{:?}", e)))?;
    writer.flush()?;
    Ok(())
}

pub fn load_channel<P: AsRef<Path>>(path: P) -> Result<ChannelRecord> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    ciborium::de::from_reader(reader).map_err(|e| Error::Persistence(format!("{}: {:?}", path.display(), e)))
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hydrogrid-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn grid() -> GridDescriptor {
        GridDescriptor::new(1, [6, 1, 1], [0.0; 3], [1.0; 3]).unwrap()
    }

    #[test]
    fn channels_are_written_in_planar_layout() {
        let dir = scratch_dir("planar");
        let state: Vec<f64> = (0..12).map(|n| n as f64).collect();
        let index = save(&dir, &["density", "momentum x"], &grid(), &state).unwrap();
        assert_eq!(index, 0);

        let record = load_channel(channel_path(&dir, "momentum x", 0)).unwrap();
        assert_eq!(record.name, "momentum x");
        assert_eq!(record.size, [6, 1, 1]);
        assert_eq!(record.data, vec![1.0, 3.0, 5.0, 7.0, 9.0, 11.0]);
        assert!(dir.join("momentum_x0.cbor").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn save_index_skips_existing_files() {
        let dir = scratch_dir("index");
        std::fs::create_dir_all(&dir).unwrap();
        File::create(channel_path(&dir, "density", 0)).unwrap();
        File::create(channel_path(&dir, "density", 1)).unwrap();

        let index = save(&dir, &["density"], &grid(), &[0.0; 6]).unwrap();
        assert_eq!(index, 2);
        assert_eq!(save(&dir, &["density"], &grid(), &[0.0; 6]).unwrap(), 3);
        assert_eq!(load_channel(channel_path(&dir, "density", 2)).unwrap().index, 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_final_write_is_reported() {
        let record = ChannelRecord { name: "density".into(), index: 0, size: [6, 1, 1], data: vec![1.0; 6] };
        assert!(matches!(write_record(&record, FullDisk), Err(Error::Io(_))));

        let mut bytes = Vec::new();
        write_record(&record, &mut bytes).unwrap();
        assert_eq!(ciborium::de::from_reader::<ChannelRecord, _>(&bytes[..]).unwrap(), record);
    }

    #[test]
    fn loading_a_garbage_file_is_a_persistence_error() {
        let dir = scratch_dir("garbage");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("junk.cbor");
        std::fs::write(&path, b"\xff\xff not cbor").unwrap();
        assert!(matches!(load_channel(&path), Err(Error::Persistence(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
