//! Source manager
//!
//! Owns every source buffer for one translation unit, mints `FileID`s,
//! decodes packed locations back to (file, line, column), and models
//! macro instantiation: a token born from expansion carries both the
//! location where its spelling physically lives and the range where it
//! was used.

use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::{
    BasicResult, FileEntry, FileID, PresumedLoc, SourceBuffer, SourceLocation,
};

/// One record in the instantiation side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantiationInfo {
    /// Where the characters of the token physically live.
    pub spelling_loc: SourceLocation,
    /// Start of the range the token was instantiated over.
    pub instantiation_start: SourceLocation,
    /// End of that range.
    pub instantiation_end: SourceLocation,
    /// Byte length of the token at the spelling location.
    pub token_len: u32,
}

/// Loaded bytes for one file, shared by every `FileID` that re-enters
/// the same file.
struct ContentCache {
    buffer: SourceBuffer,
    file_entry: Option<FileEntry>,
    /// Start offsets of each line, built on first line/column query.
    line_offsets: OnceCell<Box<[u32]>>,
}

impl ContentCache {
    fn new(buffer: SourceBuffer, file_entry: Option<FileEntry>) -> Self {
        Self {
            buffer,
            file_entry,
            line_offsets: OnceCell::new(),
        }
    }
}

/// Per-`FileID` state.
struct FileInfo {
    content: u32,
    include_loc: SourceLocation,
}

/// The registry of all sources in one translation unit.
#[derive(Default)]
pub struct SourceManager {
    contents: Vec<ContentCache>,
    content_by_uid: HashMap<u32, u32>,
    files: Vec<FileInfo>,
    instantiations: Vec<InstantiationInfo>,
    main_file: FileID,
}

impl std::fmt::Debug for SourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceManager")
            .field("files", &self.files.len())
            .field("instantiations", &self.instantiations.len())
            .finish()
    }
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` as a new source, reading its bytes on first
    /// contact. `include_loc` records where the `#include` was (invalid
    /// for the main file).
    pub fn create_file_id(
        &mut self,
        entry: &FileEntry,
        include_loc: SourceLocation,
    ) -> BasicResult<FileID> {
        let content = match self.content_by_uid.get(&entry.uid()) {
            Some(&idx) => idx,
            None => {
                let buffer = SourceBuffer::from_file(entry.name())?;
                let idx = self.contents.len() as u32;
                self.contents
                    .push(ContentCache::new(buffer, Some(entry.clone())));
                self.content_by_uid.insert(entry.uid(), idx);
                idx
            }
        };
        Ok(self.push_file(content, include_loc))
    }

    /// Register an already-built buffer (`<built-in>`, scratch, stdin).
    pub fn create_file_id_for_buffer(&mut self, buffer: SourceBuffer) -> FileID {
        let idx = self.contents.len() as u32;
        self.contents.push(ContentCache::new(buffer, None));
        self.push_file(idx, SourceLocation::invalid())
    }

    fn push_file(&mut self, content: u32, include_loc: SourceLocation) -> FileID {
        self.files.push(FileInfo {
            content,
            include_loc,
        });
        FileID::from_index(self.files.len() - 1)
    }

    /// Register the main translation unit. Re-entering the main file is
    /// a precondition violation.
    pub fn create_main_file_id(&mut self, entry: &FileEntry) -> BasicResult<FileID> {
        assert!(
            self.main_file.is_invalid(),
            "main file already registered"
        );
        let fid = self.create_file_id(entry, SourceLocation::invalid())?;
        self.main_file = fid;
        Ok(fid)
    }

    /// Main-file registration for an in-memory buffer (stdin).
    pub fn create_main_file_id_for_buffer(&mut self, buffer: SourceBuffer) -> FileID {
        assert!(
            self.main_file.is_invalid(),
            "main file already registered"
        );
        let fid = self.create_file_id_for_buffer(buffer);
        self.main_file = fid;
        fid
    }

    pub fn main_file_id(&self) -> FileID {
        self.main_file
    }

    pub fn loc_for_start_of_file(&self, fid: FileID) -> SourceLocation {
        SourceLocation::file_loc(fid, 0)
    }

    /// Where file `fid` was included from; invalid for the main file and
    /// memory buffers.
    pub fn include_loc(&self, fid: FileID) -> SourceLocation {
        self.files[fid.index()].include_loc
    }

    /// Record a new virtual range for a macro-expanded token and return
    /// a fresh instantiation location for it.
    pub fn create_instantiation_loc(
        &mut self,
        spelling_loc: SourceLocation,
        instantiation_start: SourceLocation,
        instantiation_end: SourceLocation,
        token_len: u32,
    ) -> SourceLocation {
        let index = self.instantiations.len();
        self.instantiations.push(InstantiationInfo {
            spelling_loc,
            instantiation_start,
            instantiation_end,
            token_len,
        });
        SourceLocation::instantiation(index)
    }

    pub fn instantiation_info(&self, loc: SourceLocation) -> &InstantiationInfo {
        &self.instantiations[loc.instantiation_index()]
    }

    /// Resolve to the use-site location: where the macro was invoked.
    pub fn instantiation_loc(&self, loc: SourceLocation) -> SourceLocation {
        let mut cur = loc;
        while cur.is_instantiation() {
            cur = self.instantiations[cur.instantiation_index()].instantiation_start;
        }
        cur
    }

    /// Resolve to the spelling location: where the characters live.
    pub fn spelling_loc(&self, loc: SourceLocation) -> SourceLocation {
        let mut cur = loc;
        while cur.is_instantiation() {
            cur = self.instantiations[cur.instantiation_index()].spelling_loc;
        }
        cur
    }

    /// Decompose into (file, offset), resolving instantiations through
    /// their spelling.
    pub fn decomposed_loc(&self, loc: SourceLocation) -> (FileID, u32) {
        let spelling = self.spelling_loc(loc);
        debug_assert!(spelling.is_file_id(), "decomposing an invalid location");
        (spelling.file_id(), spelling.file_offset())
    }

    /// The bytes starting at `loc`, running to the end of its buffer
    /// (trailing NUL sentinel included).
    pub fn character_data(&self, loc: SourceLocation) -> &[u8] {
        let (fid, offset) = self.decomposed_loc(loc);
        &self.content(fid).buffer.bytes_with_sentinel()[offset as usize..]
    }

    pub fn buffer(&self, fid: FileID) -> &SourceBuffer {
        &self.content(fid).buffer
    }

    /// Buffer contents including the trailing NUL sentinel.
    pub fn buffer_data(&self, fid: FileID) -> &[u8] {
        self.content(fid).buffer.bytes_with_sentinel()
    }

    pub fn file_entry_for_id(&self, fid: FileID) -> Option<&FileEntry> {
        self.content(fid).file_entry.as_ref()
    }

    /// The (filename, line, column) a diagnostic should print for `loc`,
    /// resolved through the instantiation (use-site) location.
    pub fn presumed_loc(&self, loc: SourceLocation) -> PresumedLoc<'_> {
        let iloc = self.instantiation_loc(loc);
        let (fid, offset) = (iloc.file_id(), iloc.file_offset());
        PresumedLoc {
            filename: self.content(fid).buffer.name(),
            line: self.line_number_of(fid, offset),
            column: self.column_number_of(fid, offset),
        }
    }

    /// 1-based line number. A location on a newline byte belongs to the
    /// line that ends at that newline.
    pub fn line_number(&self, loc: SourceLocation) -> u32 {
        let (fid, offset) = self.decomposed_loc(loc);
        self.line_number_of(fid, offset)
    }

    /// 1-based column number.
    pub fn column_number(&self, loc: SourceLocation) -> u32 {
        let (fid, offset) = self.decomposed_loc(loc);
        self.column_number_of(fid, offset)
    }

    fn line_number_of(&self, fid: FileID, offset: u32) -> u32 {
        let starts = self.line_offsets(fid);
        starts.partition_point(|&start| start <= offset) as u32
    }

    fn column_number_of(&self, fid: FileID, offset: u32) -> u32 {
        let starts = self.line_offsets(fid);
        let line = starts.partition_point(|&start| start <= offset);
        offset - starts[line - 1] + 1
    }

    fn line_offsets(&self, fid: FileID) -> &[u32] {
        let content = self.content(fid);
        content.line_offsets.get_or_init(|| {
            let bytes = content.buffer.bytes();
            let mut starts = vec![0u32];
            let mut i = 0;
            while i < bytes.len() {
                match bytes[i] {
                    b'\n' => starts.push(i as u32 + 1),
                    b'\r' => {
                        if bytes.get(i + 1) != Some(&b'\n') {
                            starts.push(i as u32 + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            starts.into_boxed_slice()
        })
    }

    /// Append bytes into a scratch chunk registered earlier. Only valid
    /// for writable buffers; the line index for the chunk is rebuilt on
    /// the next query.
    pub fn write_scratch_bytes(&mut self, fid: FileID, offset: usize, bytes: &[u8]) {
        let content_idx = self.files[fid.index()].content as usize;
        let content = &mut self.contents[content_idx];
        content.buffer.write_bytes(offset, bytes);
        content.line_offsets = OnceCell::new();
    }

    /// Drop all file-IDs, instantiation records, and the main-file ID.
    /// Loaded file contents stay cached. Every outstanding location and
    /// `FileID` is invalidated by this call.
    pub fn clear_id_tables(&mut self) {
        self.files.clear();
        self.instantiations.clear();
        self.main_file = FileID::invalid();
    }

    fn content(&self, fid: FileID) -> &ContentCache {
        &self.contents[self.files[fid.index()].content as usize]
    }
}
