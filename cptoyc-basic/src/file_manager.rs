//! File manager
//!
//! Resolves textual paths to canonical directory/file entries,
//! deduplicating across hard links and symlinks by `(device, inode)`.
//! Name lookups are cached three ways: never looked up (no map entry),
//! known missing, and known present.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Cached information about one directory on disk. Immutable after
/// creation; uniqued by `(device, inode)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    name: String,
}

impl DirectoryEntry {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for a uniqued directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(u32);

/// Cached information about one file on disk. Immutable after creation;
/// uniqued by `(device, inode)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    name: String,
    size: u64,
    mtime: i64,
    dir: DirId,
    uid: u32,
    device: u64,
    inode: u64,
    mode: u32,
}

impl FileEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modification_time(&self) -> i64 {
        self.mtime
    }

    /// The directory the file lives in.
    pub fn dir(&self) -> DirId {
        self.dir
    }

    /// The dense ID minted for this entry, in creation order.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn device(&self) -> u64 {
        self.device
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn file_mode(&self) -> u32 {
        self.mode
    }
}

/// One `stat` result, as the file manager consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatInfo {
    pub device: u64,
    pub inode: u64,
    pub mode: u32,
    pub size: u64,
    pub mtime: i64,
    pub is_dir: bool,
}

/// Capability layered in front of the OS `stat`. Returning `None` means
/// the path does not exist (or `stat` failed).
pub trait StatCache {
    fn stat(&mut self, path: &str) -> Option<StatInfo>;
}

/// `stat` straight from the OS.
pub fn os_stat(path: &str) -> Option<StatInfo> {
    use std::os::unix::fs::MetadataExt;
    let md = std::fs::metadata(path).ok()?;
    Some(StatInfo {
        device: md.dev(),
        inode: md.ino(),
        mode: md.mode(),
        size: md.size(),
        mtime: md.mtime(),
        is_dir: md.is_dir(),
    })
}

/// A recording `stat` interceptor. Caches every failed `stat`,
/// successful file `stat`s, and successful directory `stat`s only for
/// absolute paths (relative directories depend on the working
/// directory and would poison a replay).
#[derive(Debug, Default)]
pub struct MemorizeStatCalls {
    calls: HashMap<String, Option<StatInfo>>,
}

impl MemorizeStatCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded results, for replay.
    pub fn calls(&self) -> &HashMap<String, Option<StatInfo>> {
        &self.calls
    }
}

impl StatCache for MemorizeStatCalls {
    fn stat(&mut self, path: &str) -> Option<StatInfo> {
        let result = os_stat(path);
        match result {
            None => {
                self.calls.insert(path.to_string(), None);
            }
            Some(st) if !st.is_dir || path.starts_with('/') => {
                self.calls.insert(path.to_string(), Some(st));
            }
            Some(_) => {}
        }
        result
    }
}

/// Three-valued name cache slot: a missing key means "never looked up".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameCacheSlot {
    /// Looked up before; does not exist.
    Missing,
    /// Looked up before; arena index of the entry.
    Present(u32),
}

impl NameCacheSlot {
    fn present(self) -> Option<u32> {
        match self {
            NameCacheSlot::Missing => None,
            NameCacheSlot::Present(idx) => Some(idx),
        }
    }
}

/// Lookup statistics, exposed for the driver's stat dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileManagerStats {
    pub dir_lookups: u32,
    pub file_lookups: u32,
    pub dir_cache_misses: u32,
    pub file_cache_misses: u32,
    pub unique_dirs: usize,
    pub unique_files: usize,
}

/// Deduplicating cache over the filesystem.
#[derive(Default)]
pub struct FileManager {
    dirs: Vec<DirectoryEntry>,
    files: Vec<FileEntry>,
    dir_cache: HashMap<String, NameCacheSlot>,
    file_cache: HashMap<String, NameCacheSlot>,
    unique_dirs: HashMap<(u64, u64), u32>,
    unique_files: HashMap<(u64, u64), u32>,
    next_file_uid: u32,
    stat_cache: Option<Box<dyn StatCache>>,
    num_dir_lookups: u32,
    num_file_lookups: u32,
    num_dir_cache_misses: u32,
    num_file_cache_misses: u32,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("dirs", &self.dirs.len())
            .field("files", &self.files.len())
            .finish()
    }
}

impl FileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a `stat` interceptor in front of the OS.
    pub fn set_stat_cache(&mut self, cache: Box<dyn StatCache>) {
        self.stat_cache = Some(cache);
    }

    /// Lookup, cache, and verify the specified directory. Returns `None`
    /// if it does not exist. At most one `stat` per distinct path.
    pub fn get_directory(&mut self, name: &str) -> Option<&DirectoryEntry> {
        let idx = self.dir_index(name)?;
        Some(&self.dirs[idx as usize])
    }

    /// Lookup, cache, and verify the specified file. Returns `None` if
    /// it does not exist or names a directory.
    pub fn get_file(&mut self, filename: &str) -> Option<&FileEntry> {
        let idx = self.file_index(filename)?;
        Some(&self.files[idx as usize])
    }

    /// Resolve a [`DirId`] carried by a [`FileEntry`].
    pub fn dir(&self, id: DirId) -> &DirectoryEntry {
        &self.dirs[id.0 as usize]
    }

    pub fn stats(&self) -> FileManagerStats {
        FileManagerStats {
            dir_lookups: self.num_dir_lookups,
            file_lookups: self.num_file_lookups,
            dir_cache_misses: self.num_dir_cache_misses,
            file_cache_misses: self.num_file_cache_misses,
            unique_dirs: self.dirs.len(),
            unique_files: self.files.len(),
        }
    }

    fn stat_cached(&mut self, path: &str) -> Option<StatInfo> {
        match &mut self.stat_cache {
            Some(cache) => cache.stat(path),
            None => os_stat(path),
        }
    }

    fn dir_index(&mut self, name: &str) -> Option<u32> {
        self.num_dir_lookups += 1;
        if let Some(slot) = self.dir_cache.get(name) {
            return slot.present();
        }
        self.num_dir_cache_misses += 1;

        // Default to missing until the stat proves otherwise.
        self.dir_cache
            .insert(name.to_string(), NameCacheSlot::Missing);

        let st = self.stat_cached(name)?;
        if !st.is_dir {
            return None;
        }

        // One dir can be reached under several names when symlinked.
        let idx = match self.unique_dirs.entry((st.device, st.inode)) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(v) => {
                let idx = self.dirs.len() as u32;
                self.dirs.push(DirectoryEntry {
                    name: name.to_string(),
                });
                v.insert(idx);
                idx
            }
        };
        self.dir_cache
            .insert(name.to_string(), NameCacheSlot::Present(idx));
        Some(idx)
    }

    fn file_index(&mut self, filename: &str) -> Option<u32> {
        self.num_file_lookups += 1;
        if let Some(slot) = self.file_cache.get(filename) {
            return slot.present();
        }
        self.num_file_cache_misses += 1;

        self.file_cache
            .insert(filename.to_string(), NameCacheSlot::Missing);

        let dir_idx = self.split_dir_index(filename)?;

        let st = self.stat_cached(filename)?;
        if st.is_dir {
            return None;
        }

        let idx = match self.unique_files.entry((st.device, st.inode)) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(v) => {
                let idx = self.files.len() as u32;
                let uid = self.next_file_uid;
                self.next_file_uid += 1;
                self.files.push(FileEntry {
                    name: filename.to_string(),
                    size: st.size,
                    mtime: st.mtime,
                    dir: DirId(dir_idx),
                    uid,
                    device: st.device,
                    inode: st.inode,
                    mode: st.mode,
                });
                v.insert(idx);
                idx
            }
        };
        self.file_cache
            .insert(filename.to_string(), NameCacheSlot::Present(idx));
        Some(idx)
    }

    /// Split off the directory component of `filename` and resolve it.
    /// Duplicate slashes collapse; no slash means the current directory;
    /// a trailing slash names a directory, so the file lookup fails.
    fn split_dir_index(&mut self, filename: &str) -> Option<u32> {
        let bytes = filename.as_bytes();
        let mut slash = bytes.len() as i64 - 1;
        while slash >= 0 && bytes[slash as usize] != b'/' {
            slash -= 1;
        }
        while slash > 0 && bytes[slash as usize - 1] == b'/' {
            slash -= 1;
        }

        if slash < 0 {
            self.dir_index(".")
        } else if slash as usize == bytes.len() - 1 {
            None
        } else if slash == 0 {
            self.dir_index("/")
        } else {
            self.dir_index(&filename[..slash as usize])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_missing_file_is_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fm = FileManager::new();
        let missing = tmp.path().join("nope.c");
        let missing = missing.to_str().unwrap();

        assert!(fm.get_file(missing).is_none());
        let misses = fm.stats().file_cache_misses;
        assert!(fm.get_file(missing).is_none());
        assert_eq!(fm.stats().file_cache_misses, misses);
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(tmp.path(), "a.c", b"int x;\n");
        let mut fm = FileManager::new();

        let uid = fm.get_file(&path).expect("file exists").uid();
        let stats = fm.stats();
        assert_eq!(stats.file_cache_misses, 1);

        let again = fm.get_file(&path).expect("file exists").uid();
        assert_eq!(again, uid);
        assert_eq!(fm.stats().file_cache_misses, 1);
        assert_eq!(fm.stats().file_lookups, 2);
    }

    #[test]
    fn test_hard_link_dedups_by_inode() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_file(tmp.path(), "a.c", b"int x;\n");
        let b = tmp.path().join("b.c");
        fs::hard_link(&a, &b).unwrap();
        let b = b.to_str().unwrap().to_string();

        let mut fm = FileManager::new();
        let ea = fm.get_file(&a).expect("a exists").clone();
        let eb = fm.get_file(&b).expect("b exists").clone();
        assert_eq!(ea, eb);
        assert_eq!(ea.uid(), eb.uid());
        assert_eq!(fm.stats().unique_files, 1);
    }

    #[test]
    fn test_trailing_slash_is_not_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fm = FileManager::new();
        let dir = format!("{}/", tmp.path().to_str().unwrap());
        assert!(fm.get_file(&dir).is_none());
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fm = FileManager::new();
        assert!(fm.get_file(tmp.path().to_str().unwrap()).is_none());
        assert!(fm.get_directory(tmp.path().to_str().unwrap()).is_some());
    }

    #[test]
    fn test_file_entry_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(tmp.path(), "a.c", b"0123456789");
        let mut fm = FileManager::new();
        let entry = fm.get_file(&path).expect("file exists").clone();
        assert_eq!(entry.size(), 10);
        assert_eq!(entry.name(), path);
        let dir_name = fm.dir(entry.dir()).name().to_string();
        assert_eq!(dir_name, tmp.path().to_str().unwrap());
    }

    #[test]
    fn test_uids_are_dense() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_file(tmp.path(), "a.c", b"a");
        let b = write_file(tmp.path(), "b.c", b"b");
        let mut fm = FileManager::new();
        let ua = fm.get_file(&a).unwrap().uid();
        let ub = fm.get_file(&b).unwrap().uid();
        assert_eq!(ua, 0);
        assert_eq!(ub, 1);
    }

    #[test]
    fn test_memorize_stat_calls_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let file = write_file(tmp.path(), "a.c", b"a");
        let missing = tmp.path().join("nope.c");
        let missing = missing.to_str().unwrap();

        let mut rec = MemorizeStatCalls::new();
        assert!(rec.stat(missing).is_none());
        assert!(rec.stat(&file).is_some());
        // Absolute dir: recorded.
        assert!(rec.stat(tmp.path().to_str().unwrap()).is_some());
        // Relative dir: consulted but not recorded.
        assert!(rec.stat(".").is_some());

        assert_eq!(rec.calls().get(missing), Some(&None));
        assert!(rec.calls().get(&file).map_or(false, |r| r.is_some()));
        assert!(rec.calls().contains_key(tmp.path().to_str().unwrap()));
        assert!(!rec.calls().contains_key("."));
    }

    #[test]
    fn test_stat_cache_is_consulted() {
        struct NeverExists;
        impl StatCache for NeverExists {
            fn stat(&mut self, _path: &str) -> Option<StatInfo> {
                None
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(tmp.path(), "a.c", b"a");
        let mut fm = FileManager::new();
        fm.set_stat_cache(Box::new(NeverExists));
        assert!(fm.get_file(&path).is_none());
    }
}
