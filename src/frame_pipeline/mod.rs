//! FramePipeline - Bounded Inference Offload
//!
//! ## Responsibilities
//!
//! - Bridge the signaling relay's frame-submission path to the detection
//!   engine via a small fixed worker pool
//! - Stamp receipt/inference timestamps on every frame
//! - Convert decode/inference failures into normally-shaped empty replies
//!
//! Inference is CPU-bound; the pool bound keeps concurrent executions small
//! so tail latency stays predictable, and excess requests queue instead of
//! spawning unbounded work. A single bad frame never terminates a connection
//! or stalls other frames.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::detection_engine::DetectionEngine;
use crate::error::{Error, Result};
use crate::frame_codec;
use crate::models::{Detection, DetectionReply, FrameRequest};

/// Default concurrent inference executions
pub const DEFAULT_WORKERS: usize = 2;
/// Default queued-frame depth before submitters wait
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

struct FrameJob {
    request: FrameRequest,
    recv_ts: i64,
    reply: oneshot::Sender<DetectionReply>,
}

/// FramePipeline instance
pub struct FramePipeline {
    /// Taken on shutdown so later submissions fail fast
    tx: RwLock<Option<mpsc::Sender<FrameJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FramePipeline {
    /// Start the worker pool. Must be called from within a tokio runtime.
    pub fn new(engine: Arc<DetectionEngine>, workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<FrameJob>(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = rx.clone();
                let engine = engine.clone();
                tokio::spawn(async move {
                    loop {
                        // Hold the receiver lock only while pulling one job.
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        let reply = Self::process(engine.clone(), job.request, job.recv_ts).await;
                        // The submitter may have disconnected; dropping the
                        // reply is fine.
                        let _ = job.reply.send(reply);
                    }
                    tracing::debug!(worker_id = worker_id, "Inference worker drained");
                })
            })
            .collect();

        Self {
            tx: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Submit a frame and await its detection result.
    ///
    /// Queues when all workers are busy; fails fast with
    /// [`Error::PipelineClosed`] after shutdown.
    pub async fn submit(&self, request: FrameRequest) -> Result<DetectionReply> {
        let recv_ts = Utc::now().timestamp_millis();

        let tx = self
            .tx
            .read()
            .await
            .clone()
            .ok_or(Error::PipelineClosed)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(FrameJob {
            request,
            recv_ts,
            reply: reply_tx,
        })
        .await
        .map_err(|_| Error::PipelineClosed)?;

        reply_rx.await.map_err(|_| Error::PipelineClosed)
    }

    /// Decode and run inference off the connection-serving scheduler.
    async fn process(
        engine: Arc<DetectionEngine>,
        request: FrameRequest,
        recv_ts: i64,
    ) -> DetectionReply {
        let frame_id = request.frame_id.clone();
        let capture_ts = request.capture_ts;

        let outcome = tokio::task::spawn_blocking(move || -> (i64, Result<Vec<Detection>>) {
            let image = match frame_codec::decode_frame(&request.data) {
                Ok(image) => image,
                Err(e) => return (Utc::now().timestamp_millis(), Err(e)),
            };
            let inference_ts = Utc::now().timestamp_millis();
            (inference_ts, engine.detect(&image))
        })
        .await;

        match outcome {
            Ok((inference_ts, Ok(detections))) => DetectionReply {
                frame_id,
                capture_ts,
                recv_ts,
                inference_ts,
                detections,
                error: None,
            },
            Ok((inference_ts, Err(e))) => {
                tracing::warn!(frame_id = %frame_id, error = %e, "Frame processing failed");
                DetectionReply {
                    frame_id,
                    capture_ts,
                    recv_ts,
                    inference_ts,
                    detections: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
            Err(e) => {
                tracing::error!(frame_id = %frame_id, error = %e, "Inference task panicked");
                DetectionReply {
                    frame_id,
                    capture_ts,
                    recv_ts,
                    inference_ts: Utc::now().timestamp_millis(),
                    detections: Vec::new(),
                    error: Some("inference task failed".to_string()),
                }
            }
        }
    }

    /// Close the queue and let outstanding work drain.
    pub async fn shutdown(&self) {
        let tx = self.tx.write().await.take();
        drop(tx);

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
        tracing::info!("Frame pipeline shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection_engine::DEFAULT_CONF_THRESHOLD;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn pipeline() -> FramePipeline {
        let engine = Arc::new(DetectionEngine::disabled(640, 640, DEFAULT_CONF_THRESHOLD));
        FramePipeline::new(engine, 2, 4)
    }

    fn png_payload() -> String {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([1, 2, 3])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&bytes))
    }

    fn request(frame_id: &str, data: String) -> FrameRequest {
        FrameRequest {
            frame_id: frame_id.to_string(),
            capture_ts: 1_000,
            data,
        }
    }

    #[tokio::test]
    async fn valid_frame_without_model_yields_empty_reply() {
        let pipeline = pipeline();
        let reply = pipeline.submit(request("f1", png_payload())).await.unwrap();

        assert_eq!(reply.frame_id, "f1");
        assert_eq!(reply.capture_ts, 1_000);
        assert!(reply.detections.is_empty());
        assert!(reply.error.is_none());
        assert!(reply.recv_ts <= reply.inference_ts);
    }

    #[tokio::test]
    async fn corrupted_payload_yields_flagged_empty_reply() {
        let pipeline = pipeline();
        let reply = pipeline
            .submit(request("f1", "data:image/jpeg;base64,!!!!".to_string()))
            .await
            .unwrap();

        assert_eq!(reply.frame_id, "f1");
        assert!(reply.detections.is_empty());
        assert!(reply.error.is_some());
    }

    #[tokio::test]
    async fn bad_frame_does_not_stall_other_frames() {
        let pipeline = Arc::new(pipeline());

        let bad = pipeline.submit(request("bad", "garbage".to_string()));
        let good = pipeline.submit(request("good", png_payload()));
        let (bad, good) = tokio::join!(bad, good);

        assert!(bad.unwrap().error.is_some());
        assert!(good.unwrap().error.is_none());
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails_fast() {
        let pipeline = pipeline();
        pipeline.shutdown().await;

        let err = pipeline
            .submit(request("f1", png_payload()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PipelineClosed));
    }

    #[tokio::test]
    async fn shutdown_drains_outstanding_work() {
        let pipeline = Arc::new(pipeline());

        let submitted: Vec<_> = (0..4)
            .map(|i| {
                let pipeline = pipeline.clone();
                let payload = png_payload();
                tokio::spawn(async move { pipeline.submit(request(&format!("f{i}"), payload)).await })
            })
            .collect();

        // Give the submissions a chance to enqueue before closing.
        tokio::task::yield_now().await;
        pipeline.shutdown().await;

        for handle in submitted {
            // Each submission either completed or observed the closed queue;
            // none may hang.
            let _ = handle.await.unwrap();
        }
    }
}
