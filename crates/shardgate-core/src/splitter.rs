//! Streaming fan-out of one reader into N consumer readers.
//!
//! A [`MultiSplitter`] pulls a source reader in fixed-size chunks, applies a
//! splitter function to each chunk, and delivers the i-th slice of every
//! chunk to the i-th consumer handle. It is the streaming counterpart of the
//! shard codec's split algebra: a future streaming PutObject would feed the
//! four upstream bodies from one request body through it.
//!
//! # Concurrency contract
//!
//! One producer task reads the source serially. Each consumer has a
//! single-slot channel, so the producer advances only when every consumer
//! has drained the previous chunk — an implicit rendezvous that bounds
//! buffering at one chunk per consumer.
//!
//! The producer task is not spawned at construction. It starts on the first
//! read of handle #0, so an unused splitter costs nothing. Consumers of the
//! other handles block until handle #0 is first read.
//!
//! # Termination
//!
//! The splitter reaches [`SplitterState::Done`] when the source reports EOF
//! (a partial final chunk is still delivered), when the splitter function
//! returns the wrong number of slices (fatal, reported to every consumer),
//! or when [`MultiSplitter::close`] is called. Close is idempotent and may
//! be called from any handle; afterwards every consumer read returns
//! end-of-stream.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Splits one chunk of source bytes into exactly one slice per consumer.
///
/// Called once per chunk, in source order. The returned vector must have
/// exactly as many elements as there are consumers; anything else tears the
/// whole splitter down.
pub type SplitterFn = Box<dyn FnMut(&[u8]) -> Vec<Bytes> + Send>;

/// Failures surfaced by the splitter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SplitterError {
    /// The chunk size passed to the constructor was zero.
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    /// The number of outputs passed to the constructor was zero.
    #[error("number of outputs must be positive")]
    ZeroOutputs,
    /// The splitter function returned a wrong-sized slice vector.
    #[error("splitter function returned {got} slices, expected {want}")]
    InvalidOutput {
        /// Number of slices the function returned.
        got: usize,
        /// Number of consumers.
        want: usize,
    },
    /// Reading the source failed.
    #[error("source read failed: {0}")]
    Source(String),
}

/// Lifecycle of a [`MultiSplitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterState {
    /// Constructed; the producer task has not started.
    Started,
    /// The producer task is pulling the source.
    Running,
    /// Terminated — EOF, fatal error, or closed.
    Done,
}

type Item = Result<Bytes, SplitterError>;

/// Everything the producer task needs, parked until handle #0 is read.
struct Seed {
    source: Pin<Box<dyn AsyncRead + Send>>,
    splitter: SplitterFn,
    senders: Vec<mpsc::Sender<Item>>,
    chunk_size: usize,
}

struct Shared {
    state: Mutex<SplitterState>,
    seed: Mutex<Option<Seed>>,
    cancel: CancellationToken,
}

impl Shared {
    fn ensure_running(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if *state != SplitterState::Started {
                return;
            }
            *state = SplitterState::Running;
        }
        if let Some(seed) = self.seed.lock().take() {
            debug!("starting multi-splitter producer task");
            let shared = Arc::clone(self);
            tokio::spawn(run_producer(seed, shared));
        }
    }

    fn close(&self) {
        *self.state.lock() = SplitterState::Done;
        self.cancel.cancel();
        // Dropping a parked seed drops its senders, waking any consumer
        // blocked on a channel the producer never served.
        drop(self.seed.lock().take());
    }
}

/// Read up to `buf.len()` bytes, stopping early only at EOF.
async fn read_chunk(
    source: &mut Pin<Box<dyn AsyncRead + Send>>,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn fan_error(senders: &[mpsc::Sender<Item>], err: SplitterError) {
    for tx in senders {
        // A consumer that already went away is fine to skip.
        let _ = tx.send(Err(err.clone())).await;
    }
}

async fn run_producer(mut seed: Seed, shared: Arc<Shared>) {
    let want = seed.senders.len();
    let mut buf = vec![0u8; seed.chunk_size];

    loop {
        let n = match read_chunk(&mut seed.source, &mut buf).await {
            Ok(n) => n,
            Err(e) => {
                fan_error(&seed.senders, SplitterError::Source(e.to_string())).await;
                break;
            }
        };
        if n == 0 {
            break;
        }

        let slices = (seed.splitter)(&buf[..n]);
        if slices.len() != want {
            fan_error(
                &seed.senders,
                SplitterError::InvalidOutput {
                    got: slices.len(),
                    want,
                },
            )
            .await;
            break;
        }

        let mut delivered = true;
        for (tx, slice) in seed.senders.iter().zip(slices) {
            tokio::select! {
                () = shared.cancel.cancelled() => {
                    delivered = false;
                    break;
                }
                sent = tx.send(Ok(slice)) => {
                    if sent.is_err() {
                        delivered = false;
                        break;
                    }
                }
            }
        }
        if !delivered || n < seed.chunk_size {
            break;
        }
    }

    *shared.state.lock() = SplitterState::Done;
    debug!("multi-splitter producer task finished");
    // The senders drop with the seed; consumers observe end-of-stream once
    // their channels drain.
}

/// Handle controlling a running fan-out. See the module docs.
pub struct MultiSplitter {
    shared: Arc<Shared>,
}

impl MultiSplitter {
    /// Create a splitter over `source`, reading `chunk_size` bytes at a time
    /// and fanning each chunk out to `outputs` consumer handles through
    /// `splitter`.
    ///
    /// Returns the control handle and one [`SplitReader`] per consumer.
    ///
    /// # Errors
    ///
    /// Fails synchronously when `chunk_size` or `outputs` is zero.
    pub fn new<R>(
        source: R,
        chunk_size: usize,
        outputs: usize,
        splitter: SplitterFn,
    ) -> Result<(Self, Vec<SplitReader>), SplitterError>
    where
        R: AsyncRead + Send + 'static,
    {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if outputs == 0 {
            return Err(SplitterError::ZeroOutputs);
        }

        let mut senders = Vec::with_capacity(outputs);
        let mut receivers = Vec::with_capacity(outputs);
        for _ in 0..outputs {
            let (tx, rx) = mpsc::channel(1);
            senders.push(tx);
            receivers.push(rx);
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(SplitterState::Started),
            seed: Mutex::new(Some(Seed {
                source: Box::pin(source),
                splitter,
                senders,
                chunk_size,
            })),
            cancel: CancellationToken::new(),
        });

        let readers = receivers
            .into_iter()
            .enumerate()
            .map(|(index, rx)| SplitReader {
                index,
                rx,
                buffer: Bytes::new(),
                shared: Arc::clone(&shared),
            })
            .collect();

        Ok((Self { shared }, readers))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SplitterState {
        *self.shared.state.lock()
    }

    /// Tear the splitter down. Idempotent; after this every consumer read
    /// returns end-of-stream.
    pub fn close(&self) {
        self.shared.close();
    }
}

/// One consumer's view of the fan-out; yields that consumer's slice of every
/// chunk, in source order.
pub struct SplitReader {
    index: usize,
    rx: mpsc::Receiver<Item>,
    buffer: Bytes,
    shared: Arc<Shared>,
}

impl SplitReader {
    /// The consumer index of this handle.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Tear the whole splitter down from this handle. Equivalent to
    /// [`MultiSplitter::close`].
    pub fn close(&self) {
        self.shared.close();
    }
}

impl AsyncRead for SplitReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            if this.shared.cancel.is_cancelled() {
                return Poll::Ready(Ok(()));
            }
            if !this.buffer.is_empty() {
                let n = this.buffer.len().min(out.remaining());
                out.put_slice(&this.buffer.split_to(n));
                return Poll::Ready(Ok(()));
            }
            if this.index == 0 {
                this.shared.ensure_running();
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(data))) => {
                    // Zero-length slices are legal splitter output but would
                    // read as EOF; skip to the next chunk instead.
                    if !data.is_empty() {
                        this.buffer = data;
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::InvalidData, e)));
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Divide a chunk into `outputs` equal slices of `chunk_size / outputs`
    /// bytes each, clamped to the actual chunk length. Mirrors how the shard
    /// codec would carve a streaming body.
    fn slice_evenly(chunk: &[u8], chunk_size: usize, outputs: usize) -> Vec<Bytes> {
        let part = chunk_size / outputs;
        (0..outputs)
            .map(|i| {
                let start = (i * part).min(chunk.len());
                let end = ((i + 1) * part).min(chunk.len());
                Bytes::copy_from_slice(&chunk[start..end])
            })
            .collect()
    }

    fn test_input() -> Vec<u8> {
        // 97 bytes, deliberately not a multiple of any tested chunk size.
        (0..97u8).map(|i| i.wrapping_mul(31).wrapping_add(7)).collect()
    }

    async fn run_conservation(chunk_size: usize, outputs: usize) {
        let input = test_input();

        let mut expected = vec![Vec::new(); outputs];
        for chunk in input.chunks(chunk_size) {
            for (i, slice) in slice_evenly(chunk, chunk_size, outputs).iter().enumerate() {
                expected[i].extend_from_slice(slice);
            }
        }

        let splitter: SplitterFn =
            Box::new(move |chunk| slice_evenly(chunk, chunk_size, outputs));
        let source = std::io::Cursor::new(input.clone());
        let (ms, readers) = MultiSplitter::new(source, chunk_size, outputs, splitter)
            .unwrap_or_else(|e| panic!("constructor failed: {e}"));

        let mut tasks = Vec::new();
        for mut reader in readers {
            tasks.push(tokio::spawn(async move {
                let index = reader.index();
                let mut got = Vec::new();
                reader
                    .read_to_end(&mut got)
                    .await
                    .unwrap_or_else(|e| panic!("reader {index} failed: {e}"));
                got
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            let got = task.await.unwrap_or_else(|e| panic!("join failed: {e}"));
            assert_eq!(
                got, expected[i],
                "consumer {i} mismatch for chunk_size={chunk_size}, outputs={outputs}"
            );
        }

        ms.close();
        assert_eq!(ms.state(), SplitterState::Done);
    }

    #[tokio::test]
    async fn test_should_conserve_bytes_across_chunk_sizes_and_outputs() {
        for chunk_size in 1..=6 {
            for outputs in 1..=5 {
                run_conservation(chunk_size, outputs).await;
            }
        }
    }

    #[tokio::test]
    async fn test_should_reject_invalid_constructor_arguments() {
        let splitter: SplitterFn = Box::new(|chunk| vec![Bytes::copy_from_slice(chunk)]);
        assert!(matches!(
            MultiSplitter::new(&b"data"[..], 0, 1, splitter),
            Err(SplitterError::ZeroChunkSize)
        ));

        let splitter: SplitterFn = Box::new(|chunk| vec![Bytes::copy_from_slice(chunk)]);
        assert!(matches!(
            MultiSplitter::new(&b"data"[..], 4, 0, splitter),
            Err(SplitterError::ZeroOutputs)
        ));
    }

    #[tokio::test]
    async fn test_should_propagate_malformed_splitter_output() {
        // Claims three outputs but produces one.
        let splitter: SplitterFn = Box::new(|chunk| vec![Bytes::copy_from_slice(chunk)]);
        let (_ms, readers) = MultiSplitter::new(&b"abcdef"[..], 2, 3, splitter)
            .unwrap_or_else(|e| panic!("constructor failed: {e}"));

        for mut reader in readers {
            let mut out = Vec::new();
            let err = reader
                .read_to_end(&mut out)
                .await
                .expect_err("expected invalid-output error");
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        }
    }

    #[tokio::test]
    async fn test_should_return_eof_after_close() {
        let input = vec![1u8; 4096];
        let splitter: SplitterFn = Box::new(|chunk| {
            let mid = chunk.len() / 2;
            vec![
                Bytes::copy_from_slice(&chunk[..mid]),
                Bytes::copy_from_slice(&chunk[mid..]),
            ]
        });
        let (ms, mut readers) = MultiSplitter::new(std::io::Cursor::new(input), 8, 2, splitter)
            .unwrap_or_else(|e| panic!("constructor failed: {e}"));

        // Drive one chunk through consumer #0, then tear down.
        let mut first = [0u8; 4];
        readers[0]
            .read_exact(&mut first)
            .await
            .unwrap_or_else(|e| panic!("first read failed: {e}"));
        ms.close();
        ms.close(); // idempotent

        for reader in &mut readers {
            let mut rest = Vec::new();
            let done = tokio::time::timeout(Duration::from_secs(1), reader.read_to_end(&mut rest))
                .await
                .expect("read after close must not hang");
            done.unwrap_or_else(|e| panic!("read after close failed: {e}"));
            assert!(rest.is_empty(), "close must drop undelivered data");
        }
        assert_eq!(ms.state(), SplitterState::Done);
    }

    #[tokio::test]
    async fn test_should_close_from_any_consumer() {
        let input = vec![9u8; 1024];
        let splitter: SplitterFn = Box::new(|chunk| {
            vec![
                Bytes::copy_from_slice(chunk),
                Bytes::copy_from_slice(chunk),
            ]
        });
        let (ms, mut readers) = MultiSplitter::new(std::io::Cursor::new(input), 16, 2, splitter)
            .unwrap_or_else(|e| panic!("constructor failed: {e}"));

        readers[1].close();
        assert_eq!(ms.state(), SplitterState::Done);

        let mut out = Vec::new();
        readers[0]
            .read_to_end(&mut out)
            .await
            .unwrap_or_else(|e| panic!("read failed: {e}"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_should_deliver_partial_final_chunk() {
        let input = b"abcdefghij"; // 10 bytes, chunk size 4 -> 4 + 4 + 2
        let splitter: SplitterFn = Box::new(|chunk| vec![Bytes::copy_from_slice(chunk)]);
        let (_ms, mut readers) = MultiSplitter::new(&input[..], 4, 1, splitter)
            .unwrap_or_else(|e| panic!("constructor failed: {e}"));

        let mut out = Vec::new();
        readers[0]
            .read_to_end(&mut out)
            .await
            .unwrap_or_else(|e| panic!("read failed: {e}"));
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_should_report_eof_for_empty_source() {
        let splitter: SplitterFn = Box::new(|chunk| vec![Bytes::copy_from_slice(chunk)]);
        let (ms, mut readers) = MultiSplitter::new(&b""[..], 4, 1, splitter)
            .unwrap_or_else(|e| panic!("constructor failed: {e}"));

        let mut out = Vec::new();
        readers[0]
            .read_to_end(&mut out)
            .await
            .unwrap_or_else(|e| panic!("read failed: {e}"));
        assert!(out.is_empty());
        assert_eq!(ms.state(), SplitterState::Done);
    }
}
