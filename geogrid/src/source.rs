use memmap2::Mmap;
use std::{fs::File, io, ops::Deref, path::Path};

/// How decoders obtain a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Read the whole file into memory.
    #[default]
    InMem,
    /// Map the file into the process's address space.
    ///
    /// Useful for large cells where only a handful of records are
    /// touched while decoding, but note that the OS may page the
    /// file back in later.
    MemMap,
}

impl ReadMode {
    pub fn open(self, path: &Path) -> io::Result<FileBytes> {
        match self {
            Self::InMem => std::fs::read(path).map(FileBytes::InMem),
            Self::MemMap => {
                let file = File::open(path)?;
                let mmap = unsafe { Mmap::map(&file)? };
                Ok(FileBytes::MemMap(mmap))
            }
        }
    }
}

/// The raw bytes of a backing file.
pub enum FileBytes {
    InMem(Vec<u8>),
    MemMap(Mmap),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::InMem(bytes) => bytes,
            Self::MemMap(mmap) => mmap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReadMode;
    use std::io::Write;

    #[test]
    fn test_modes_agree() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"UHL1 cell bytes").unwrap();
        let in_mem = ReadMode::InMem.open(file.path()).unwrap();
        let mapped = ReadMode::MemMap.open(file.path()).unwrap();
        assert_eq!(&*in_mem, b"UHL1 cell bytes");
        assert_eq!(&*in_mem, &*mapped);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadMode::MemMap
            .open(&dir.path().join("n44.dt1"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
