//! Async dispatch layer with per-kind in-flight guards.
//!
//! Each analysis kind (Basic, Texture) carries one explicit state token:
//! Idle -> Running -> Done/Failed. A second request of a kind that is
//! already Running is rejected with `Busy` rather than interleaved, so a
//! caller never receives duplicated or partial deliveries. The token is
//! held by an RAII guard, so a request future dropped mid-flight resets
//! its kind to Idle instead of leaving it Running forever. The compute
//! itself is synchronous and CPU-bound, so it runs on the blocking pool.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::analysis::{
    analyze_basic, analyze_texture, BasicAnalysisResult, BasicSettings, CancelToken,
    TextureAnalysisResult, TextureSettings,
};
use crate::buffer::PixelBuffer;
use crate::error::{PixelscopeError, Result};

/// Lifecycle of the most recent request of one analysis kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Running,
    Done,
    Failed,
}

#[derive(Clone)]
pub struct AnalysisService {
    basic: Arc<Mutex<RequestState>>,
    texture: Arc<Mutex<RequestState>>,
}

impl Default for AnalysisService {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisService {
    pub fn new() -> Self {
        Self {
            basic: Arc::new(Mutex::new(RequestState::Idle)),
            texture: Arc::new(Mutex::new(RequestState::Idle)),
        }
    }

    pub fn basic_state(&self) -> RequestState {
        *self.basic.lock().unwrap()
    }

    pub fn texture_state(&self) -> RequestState {
        *self.texture.lock().unwrap()
    }

    /// Flip a kind's token to Running, or refuse if it already is. The
    /// returned guard owns the token until `finish` or drop.
    fn try_begin(state: &Arc<Mutex<RequestState>>, kind: &'static str) -> Result<RunGuard> {
        let mut token = state.lock().unwrap();
        if *token == RequestState::Running {
            return Err(PixelscopeError::Busy(kind));
        }
        *token = RequestState::Running;
        Ok(RunGuard {
            state: Arc::clone(state),
            outcome: None,
        })
    }

    /// Dispatch a Basic analysis onto the blocking pool.
    pub async fn analyze_basic(
        &self,
        buffer: PixelBuffer,
        filename: String,
        settings: BasicSettings,
        cancel: CancelToken,
    ) -> Result<BasicAnalysisResult> {
        let guard = Self::try_begin(&self.basic, "basic")?;

        let result = tokio::task::spawn_blocking(move || {
            analyze_basic(&buffer, &filename, &settings, &cancel)
        })
        .await
        .map_err(|e| PixelscopeError::Processing(format!("Task join error: {}", e)))
        .and_then(|inner| inner);

        guard.finish(result.is_ok());
        result
    }

    /// Dispatch a Texture analysis onto the blocking pool.
    pub async fn analyze_texture(
        &self,
        buffer: PixelBuffer,
        filename: String,
        settings: TextureSettings,
        cancel: CancelToken,
    ) -> Result<TextureAnalysisResult> {
        let guard = Self::try_begin(&self.texture, "texture")?;

        let result = tokio::task::spawn_blocking(move || {
            analyze_texture(&buffer, &filename, &settings, &cancel)
        })
        .await
        .map_err(|e| PixelscopeError::Processing(format!("Task join error: {}", e)))
        .and_then(|inner| inner);

        guard.finish(result.is_ok());
        result
    }
}

/// Holds one kind's Running token. Dropping the guard without calling
/// `finish` (the request future was abandoned at an await point) resets
/// the token to Idle so later requests are not rejected as Busy.
#[derive(Debug)]
struct RunGuard {
    state: Arc<Mutex<RequestState>>,
    outcome: Option<RequestState>,
}

impl RunGuard {
    fn finish(mut self, ok: bool) {
        self.outcome = Some(if ok {
            RequestState::Done
        } else {
            RequestState::Failed
        });
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut token = self.state.lock().unwrap();
        *token = self.outcome.take().unwrap_or(RequestState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard_image(size: usize, cell: usize) -> PixelBuffer {
        let mut data = Vec::with_capacity(size * size * 3);
        for y in 0..size {
            for x in 0..size {
                let v = if (y / cell + x / cell) % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        PixelBuffer::new(size, size, 3, data).unwrap()
    }

    #[test]
    fn test_guard_rejects_second_request_while_running() {
        let service = AnalysisService::new();
        let _running = AnalysisService::try_begin(&service.basic, "basic").unwrap();
        let err = AnalysisService::try_begin(&service.basic, "basic").unwrap_err();
        assert!(matches!(err, PixelscopeError::Busy("basic")));

        // The other kind is independent.
        let _other = AnalysisService::try_begin(&service.texture, "texture").unwrap();
    }

    #[test]
    fn test_guard_reusable_after_finish() {
        let service = AnalysisService::new();
        let guard = AnalysisService::try_begin(&service.basic, "basic").unwrap();
        guard.finish(false);
        assert_eq!(service.basic_state(), RequestState::Failed);
        let _again = AnalysisService::try_begin(&service.basic, "basic").unwrap();
    }

    #[test]
    fn test_guard_drop_without_finish_resets_to_idle() {
        let service = AnalysisService::new();
        {
            let _guard = AnalysisService::try_begin(&service.basic, "basic").unwrap();
            assert_eq!(service.basic_state(), RequestState::Running);
        }
        assert_eq!(service.basic_state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_basic_round_trip_sets_done() {
        let service = AnalysisService::new();
        let buf = checkerboard_image(32, 4);
        let result = service
            .analyze_basic(
                buf,
                "checker.png".to_string(),
                BasicSettings::default(),
                CancelToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.filename, "checker.png");
        assert_eq!(service.basic_state(), RequestState::Done);
        // The other kind was never touched.
        assert_eq!(service.texture_state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_abandoned_request_does_not_wedge_the_kind() {
        let service = AnalysisService::new();
        let buf = checkerboard_image(32, 4);

        // Poll the request once so it claims the token, then abandon it
        // mid-flight by letting the future drop.
        let fut = service.analyze_basic(
            buf.clone(),
            "x.png".to_string(),
            BasicSettings::default(),
            CancelToken::new(),
        );
        let polled = tokio::time::timeout(std::time::Duration::ZERO, fut).await;
        assert!(polled.is_err(), "request should still be in flight");

        assert_ne!(service.basic_state(), RequestState::Running);

        // A fresh request of the same kind goes through.
        service
            .analyze_basic(
                buf,
                "x.png".to_string(),
                BasicSettings::default(),
                CancelToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(service.basic_state(), RequestState::Done);
    }

    #[tokio::test]
    async fn test_texture_failure_sets_failed() {
        let service = AnalysisService::new();
        let buf = checkerboard_image(32, 4);
        let bad = TextureSettings {
            levels: 3,
            ..Default::default()
        };
        let err = service
            .analyze_texture(buf, "x.png".to_string(), bad, CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PixelscopeError::InvalidParameter(_)));
        assert_eq!(service.texture_state(), RequestState::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_request_fails_and_releases_guard() {
        let service = AnalysisService::new();
        let buf = checkerboard_image(32, 4);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = service
            .analyze_texture(
                buf.clone(),
                "x.png".to_string(),
                TextureSettings::default(),
                cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PixelscopeError::Cancelled));
        assert_eq!(service.texture_state(), RequestState::Failed);

        // A fresh request goes through afterwards.
        service
            .analyze_texture(
                buf,
                "x.png".to_string(),
                TextureSettings::default(),
                CancelToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(service.texture_state(), RequestState::Done);
    }
}
