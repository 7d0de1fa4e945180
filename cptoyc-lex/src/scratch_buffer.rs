//! Scratch buffer
//!
//! Synthesized tokens (`#`/`##` paste results, `__LINE__` expansions)
//! need real source locations. The scratch buffer appends their text
//! into chunks that the source manager treats as ordinary files named
//! `<scratch space>`. Each token is preceded by `\n` and followed by
//! `\0`, so re-lexing one in isolation is safe and diagnostics underline
//! it on its own virtual line.

use cptoyc_basic::{FileID, SourceBuffer, SourceLocation, SourceManager};

/// The size of each chunk of scratch memory. Slightly less than a page,
/// almost certainly enough for anything.
const SCRATCH_BUF_SIZE: usize = 4060;

pub struct ScratchBuffer {
    cur_fid: FileID,
    cur_size: usize,
    bytes_used: usize,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchBuffer {
    pub fn new() -> Self {
        // bytes_used at capacity so the first token forces a chunk.
        Self {
            cur_fid: FileID::invalid(),
            cur_size: SCRATCH_BUF_SIZE,
            bytes_used: SCRATCH_BUF_SIZE,
        }
    }

    /// Copy `bytes` into scratch and return the location of their first
    /// byte. The chunk layout around them is `\n` + bytes + `\0`.
    pub fn get_token(&mut self, sm: &mut SourceManager, bytes: &[u8]) -> SourceLocation {
        if self.bytes_used + bytes.len() + 2 > self.cur_size {
            self.alloc_scratch_buffer(sm, bytes.len() + 2);
        }

        // Prefix with \n so the token starts its own virtual line.
        sm.write_scratch_bytes(self.cur_fid, self.bytes_used, b"\n");
        self.bytes_used += 1;

        let offset = self.bytes_used;
        sm.write_scratch_bytes(self.cur_fid, offset, bytes);
        self.bytes_used += bytes.len() + 1;

        // NUL-terminate so tokens stay separated if relexed.
        sm.write_scratch_bytes(self.cur_fid, self.bytes_used - 1, b"\0");

        sm.loc_for_start_of_file(self.cur_fid)
            .file_loc_with_offset(offset as i64)
    }

    fn alloc_scratch_buffer(&mut self, sm: &mut SourceManager, request: usize) {
        // Oversized requests get a dedicated chunk; everything else uses
        // the default page.
        let size = request.max(SCRATCH_BUF_SIZE);
        let fid = sm.create_file_id_for_buffer(SourceBuffer::new_zeroed(size, "<scratch space>"));
        self.cur_fid = fid;
        self.cur_size = size;
        // Burn byte zero so offset 0 is never a token start.
        self.bytes_used = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_framed() {
        let mut sm = SourceManager::new();
        let mut scratch = ScratchBuffer::new();

        let loc = scratch.get_token(&mut sm, b"__LINE__");
        let (fid, off) = sm.decomposed_loc(loc);
        let data = sm.buffer_data(fid);
        assert_eq!(data[off as usize - 1], b'\n');
        assert_eq!(&data[off as usize..off as usize + 8], b"__LINE__");
        assert_eq!(data[off as usize + 8], 0);
        assert_eq!(sm.buffer(fid).name(), "<scratch space>");
    }

    #[test]
    fn test_consecutive_tokens_never_share_a_line() {
        let mut sm = SourceManager::new();
        let mut scratch = ScratchBuffer::new();

        let l1 = scratch.get_token(&mut sm, b"abc");
        let l2 = scratch.get_token(&mut sm, b"defg");
        let (fid1, o1) = sm.decomposed_loc(l1);
        let (fid2, o2) = sm.decomposed_loc(l2);
        assert_eq!(fid1, fid2);
        // The byte immediately before the second token is the newline.
        assert_eq!(sm.buffer_data(fid2)[o2 as usize - 1], b'\n');
        assert_ne!(sm.line_number(l1), sm.line_number(l2));
        assert!(o2 > o1);
    }

    #[test]
    fn test_oversized_token_gets_its_own_chunk() {
        let mut sm = SourceManager::new();
        let mut scratch = ScratchBuffer::new();

        let small = scratch.get_token(&mut sm, b"x");
        let big = vec![b'a'; SCRATCH_BUF_SIZE * 2];
        let loc = scratch.get_token(&mut sm, &big);
        let (fid, off) = sm.decomposed_loc(loc);
        assert_ne!(sm.decomposed_loc(small).0, fid);
        let data = sm.buffer_data(fid);
        assert_eq!(&data[off as usize..off as usize + big.len()], &big[..]);
    }

    #[test]
    fn test_chunk_rollover() {
        let mut sm = SourceManager::new();
        let mut scratch = ScratchBuffer::new();

        let first = scratch.get_token(&mut sm, b"q");
        let first_fid = sm.decomposed_loc(first).0;
        let mut last_fid = first_fid;
        for _ in 0..SCRATCH_BUF_SIZE / 4 {
            let loc = scratch.get_token(&mut sm, b"xy");
            last_fid = sm.decomposed_loc(loc).0;
        }
        assert_ne!(first_fid, last_fid, "expected a second chunk");
    }
}
