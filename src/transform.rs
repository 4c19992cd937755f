//! Per-entry content transformation.
//!
//! A [`ContentTransformer`] rewrites one entry's content during a rewrite:
//! it consumes the entry's input stream and pushes replacement bytes into
//! an output sink. Transformers are registered per path and only ever act
//! on entries that exist in the source archive.
//!
//! When the rewrite destination is another archive, the transformer writes
//! straight into the codec's output stream on the calling thread. When the
//! destination is an exploded directory, the push-style transformer has to
//! meet a pull-style file write; [`write_transformed_file`] bridges the two
//! with a bounded in-memory pipe and a single short-lived worker thread.
//! The worker is joined before the bridge returns, its failure is re-raised
//! on the calling thread, and the bounded channel is the only backpressure
//! point in the crate. There is no cancellation: a bridged transform runs
//! to completion or fails.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use crate::entry::EntryRecord;
use crate::{Error, Result};

/// Number of in-flight chunks the transform pipe buffers before the
/// pushing side blocks.
const PIPE_DEPTH: usize = 16;

/// Rewrites the content of a single archive entry.
///
/// Implementations read the original content from `input` and write the
/// replacement to `output`. The record describes the entry being
/// transformed (with its post-mapping destination path).
///
/// Any closure with the matching shape is a transformer:
///
/// ```
/// use std::io::{Read, Write};
/// use zipwright::{ContentTransformer, EntryRecord};
///
/// let upper = |input: &mut dyn Read, _record: &EntryRecord, output: &mut dyn Write| -> zipwright::Result<()> {
///     let mut text = String::new();
///     input.read_to_string(&mut text)?;
///     output.write_all(text.to_uppercase().as_bytes())?;
///     Ok(())
/// };
/// fn assert_transformer(_t: &impl ContentTransformer) {}
/// assert_transformer(&upper);
/// ```
pub trait ContentTransformer {
    /// Consumes `input` and writes the transformed content to `output`.
    fn transform(
        &self,
        input: &mut dyn Read,
        record: &EntryRecord,
        output: &mut dyn Write,
    ) -> Result<()>;
}

impl<F> ContentTransformer for F
where
    F: Fn(&mut dyn Read, &EntryRecord, &mut dyn Write) -> Result<()>,
{
    fn transform(
        &self,
        input: &mut dyn Read,
        record: &EntryRecord,
        output: &mut dyn Write,
    ) -> Result<()> {
        self(input, record, output)
    }
}

/// Writing half of the bounded in-memory pipe.
///
/// Each write sends one owned chunk through the channel; once the channel
/// holds [`PIPE_DEPTH`] chunks, further writes block until the pulling side
/// catches up. A disconnected receiver surfaces as `BrokenPipe`.
pub(crate) struct PipeWriter {
    tx: SyncSender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transform pipe closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reading half of the bounded in-memory pipe.
///
/// Yields the pushed chunks in order and reports EOF once the writer has
/// been dropped and the channel drained.
pub(crate) struct PipeReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl PipeReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // Writer dropped: clean EOF.
                Err(_) => return Ok(0),
            }
        }
        let n = (self.chunk.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Creates a bounded in-memory pipe.
pub(crate) fn bounded_pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(PIPE_DEPTH);
    (PipeWriter { tx }, PipeReader::new(rx))
}

/// Runs `transformer` against `input` and materializes the transformed
/// content as the file at `dest`.
///
/// The transformer pushes on the calling thread (the entry reader borrows
/// the open archive and cannot move to another thread); one worker thread
/// owns the pulling side and the destination file. The worker is always
/// joined before this function returns. If the worker fails, the
/// transformer sees a broken pipe and the worker's error is reported as the
/// root cause; a panic on the worker is resumed on the calling thread.
///
/// Returns the number of bytes written to `dest`. The caller is
/// responsible for removing a partial file on error.
pub(crate) fn write_transformed_file(
    transformer: &dyn ContentTransformer,
    record: &EntryRecord,
    input: &mut dyn Read,
    dest: &Path,
) -> Result<u64> {
    let (mut writer, reader) = bounded_pipe();

    // Created here so an unwritable destination fails before any thread
    // is spawned.
    let file = File::create(dest)?;

    let worker = thread::Builder::new()
        .name("zipwright-transform".into())
        .spawn(move || -> io::Result<u64> {
            let mut reader = reader;
            let mut out = BufWriter::new(file);
            let written = io::copy(&mut reader, &mut out)?;
            out.flush()?;
            Ok(written)
        })
        .map_err(Error::Io)?;

    let pushed = transformer.transform(input, record, &mut writer);
    // Close our end so the worker sees EOF and drains.
    drop(writer);

    let drained = match worker.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    };

    match (pushed, drained) {
        // A worker failure is the root cause even when the transformer also
        // errored: the transformer's error is then just the broken pipe.
        (_, Err(e)) => Err(Error::Io(e)),
        (Err(e), Ok(_)) => Err(e),
        (Ok(()), Ok(written)) => Ok(written),
    }
}
