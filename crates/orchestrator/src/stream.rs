//! Streaming delivery
//!
//! The framer task receives waveform pieces from the producer over an
//! unbounded channel and writes framed bytes into a bounded channel read by
//! the transport. The header is written lazily with the first audio, since
//! the output sample rate is only known once the model has produced some.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use voicegate_core::{JobId, Waveform};
use voicegate_pipeline::{PostProcessingChain, StreamingFramer};

/// Bytes of one streamed response, in order
pub struct AudioStream {
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl AudioStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { receiver }
    }

    pub fn into_stream(self) -> ReceiverStream<Vec<u8>> {
        ReceiverStream::new(self.receiver)
    }

    /// Next piece of the body, `None` once the stream is complete
    pub async fn next_bytes(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }

    /// Drain the whole body
    pub async fn collect_bytes(mut self) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(piece) = self.receiver.recv().await {
            body.extend(piece);
        }
        body
    }
}

/// Writes framed audio to the client, tolerating disconnects
pub(crate) struct FrameSink {
    out: mpsc::Sender<Vec<u8>>,
    chunk_ms: u32,
    framer: Option<StreamingFramer>,
    client_gone: bool,
}

impl FrameSink {
    pub fn new(out: mpsc::Sender<Vec<u8>>, chunk_ms: u32) -> Self {
        Self {
            out,
            chunk_ms,
            framer: None,
            client_gone: false,
        }
    }

    pub fn client_gone(&self) -> bool {
        self.client_gone
    }

    /// Resolves once the client has dropped the response body
    async fn closed(&self) {
        self.out.closed().await
    }

    async fn send(&mut self, bytes: Vec<u8>) {
        if self.client_gone {
            return;
        }
        if self.out.send(bytes).await.is_err() {
            tracing::debug!("Stream client disconnected");
            self.client_gone = true;
        }
    }

    /// Write the header once, declaring `sample_rate`
    pub async fn start(&mut self, sample_rate: u32) {
        if self.framer.is_some() {
            return;
        }
        let mut framer = StreamingFramer::new(sample_rate, self.chunk_ms);
        let header = framer.header();
        self.framer = Some(framer);
        if let Some(header) = header {
            self.send(header).await;
        }
    }

    pub async fn audio(&mut self, samples: &[f32], sample_rate: u32) {
        self.start(sample_rate).await;
        let chunks = match self.framer.as_mut() {
            Some(framer) => framer.push(samples),
            None => return,
        };
        for chunk in chunks {
            self.send(chunk).await;
        }
    }

    /// Flush the final partial chunk and append the job marker
    pub async fn complete(&mut self, job_id: &JobId) {
        let last = self.framer.as_mut().and_then(StreamingFramer::finish);
        if let Some(last) = last {
            self.send(last).await;
        }
        self.send(StreamingFramer::job_marker(job_id)).await;
    }

    /// Append the error marker; audio already sent stays sent
    pub async fn fail(&mut self, fallback_rate: u32) {
        self.start(fallback_rate).await;
        let last = self.framer.as_mut().and_then(StreamingFramer::finish);
        if let Some(last) = last {
            self.send(last).await;
        }
        self.send(StreamingFramer::error_marker()).await;
    }
}

/// Audio gathered by the framer task
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub samples: Vec<f32>,
    pub sample_rate: Option<u32>,
    /// Pieces were framed as they arrived, with no post-processing pending
    pub forwarded: bool,
}

/// Receive pieces until the producer is done or the client leaves
///
/// When the chain is the identity at the first piece's rate, pieces are
/// framed on arrival. Otherwise they are buffered so the chain can run over
/// the whole waveform. A disconnect is noticed between pieces in both cases.
/// Returning drops `pieces`, which tells the producer to stop.
pub(crate) async fn forward_pieces(
    mut pieces: mpsc::UnboundedReceiver<Waveform>,
    sink: &mut FrameSink,
    chain: &PostProcessingChain,
) -> Collected {
    let mut collected = Collected::default();
    loop {
        let piece = tokio::select! {
            biased;
            piece = pieces.recv() => piece,
            () = sink.closed() => None,
        };
        let Some(piece) = piece else {
            if sink.out.is_closed() {
                tracing::debug!("Stream client disconnected");
                sink.client_gone = true;
            }
            break;
        };

        if collected.sample_rate.is_none() {
            collected.sample_rate = Some(piece.sample_rate);
            collected.forwarded = chain.is_identity_at(piece.sample_rate);
        }
        if collected.forwarded {
            sink.audio(&piece.samples, piece.sample_rate).await;
            if sink.client_gone() {
                break;
            }
        }
        collected.samples.extend(piece.samples);
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicegate_core::{LoudnessTarget, PostProcessing};
    use voicegate_pipeline::framer::parse_job_marker;
    use voicegate_pipeline::wav::{pcm16_bytes, WAV_HEADER_LEN};
    use voicegate_pipeline::ERROR_MARKER;

    #[tokio::test]
    async fn test_identity_forwards_on_arrival() {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = FrameSink::new(out_tx, 100);

        tx.send(Waveform::new(vec![0.25; 3_000], 24_000)).unwrap();
        tx.send(Waveform::new(vec![-0.25; 3_000], 24_000)).unwrap();
        drop(tx);

        let collected = forward_pieces(rx, &mut sink, &PostProcessingChain::default()).await;
        assert!(collected.forwarded);
        assert_eq!(collected.samples.len(), 6_000);

        let id = JobId::new();
        sink.complete(&id).await;
        drop(sink);

        let body = AudioStream::new(out_rx).collect_bytes().await;
        let marker = StreamingFramer::job_marker(&id);
        let pcm = &body[WAV_HEADER_LEN..body.len() - marker.len()];
        assert_eq!(pcm, pcm16_bytes(&collected.samples).as_slice());
        assert_eq!(parse_job_marker(&body), Some(id));
    }

    #[tokio::test]
    async fn test_active_chain_buffers() {
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = FrameSink::new(out_tx, 100);
        let chain = PostProcessingChain::new(PostProcessing {
            volume: Some(LoudnessTarget(-16.0)),
            ..Default::default()
        });

        tx.send(Waveform::new(vec![0.25; 3_000], 24_000)).unwrap();
        drop(tx);

        let collected = forward_pieces(rx, &mut sink, &chain).await;
        assert!(!collected.forwarded);
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_before_audio_still_has_header() {
        let (out_tx, out_rx) = mpsc::channel(64);
        let mut sink = FrameSink::new(out_tx, 100);
        sink.fail(24_000).await;
        drop(sink);

        let body = AudioStream::new(out_rx).collect_bytes().await;
        assert_eq!(&body[..4], b"RIFF");
        assert_eq!(&body[WAV_HEADER_LEN..], ERROR_MARKER);
    }

    #[tokio::test]
    async fn test_disconnect_noticed_while_buffering() {
        let (out_tx, out_rx) = mpsc::channel(4);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = FrameSink::new(out_tx, 100);
        let chain = PostProcessingChain::new(PostProcessing {
            speed: Some(1.5),
            ..Default::default()
        });

        tx.send(Waveform::new(vec![0.1; 2_400], 24_000)).unwrap();
        drop(out_rx);

        // the producer is still alive, so only the disconnect can end this
        let collected = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            forward_pieces(rx, &mut sink, &chain),
        )
        .await
        .expect("forwarding should stop on disconnect");
        assert!(!collected.forwarded);
        assert!(sink.client_gone());
        assert!(tx.send(Waveform::new(vec![0.1; 10], 24_000)).is_err());
    }

    #[tokio::test]
    async fn test_disconnect_stops_forwarding() {
        let (out_tx, out_rx) = mpsc::channel(1);
        drop(out_rx);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = FrameSink::new(out_tx, 100);

        tx.send(Waveform::new(vec![0.1; 2_400], 24_000)).unwrap();
        let collected = forward_pieces(rx, &mut sink, &PostProcessingChain::default()).await;
        assert!(sink.client_gone());
        assert_eq!(collected.samples.len(), 0);
        assert!(tx.send(Waveform::new(vec![0.1; 10], 24_000)).is_err());
    }
}
