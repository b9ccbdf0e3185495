//! Shared test doubles for the playback engine.
//!
//! `ScriptedDecoder` maps resource names to canned frame tables;
//! `RecordingRenderer` logs every render and can simulate a host that
//! discarded a surface. Frame payloads encode `resource#index`, so a
//! render log maps straight back to frame indices.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use reelsync_playback_core::{
    Frame, FrameDecoder, Image, RenderError, Renderer, ResourceHandle, TargetId,
};

/// Decoder returning scripted frame sequences. Unknown resources
/// decode to an empty sequence, the engine's failure signal.
#[derive(Default)]
pub struct ScriptedDecoder {
    scripts: HashMap<String, Vec<u32>>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource` with one frame per entry in `durations_ms`.
    pub fn script(mut self, resource: &str, durations_ms: &[u32]) -> Self {
        self.scripts.insert(resource.to_string(), durations_ms.to_vec());
        self
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn decode(&self, resource: &ResourceHandle) -> Vec<Frame> {
        self.scripts
            .get(resource.as_str())
            .map(|durations| {
                durations
                    .iter()
                    .enumerate()
                    .map(|(index, duration)| {
                        let payload = format!("{}#{index}", resource.as_str());
                        Frame::new(Image::from_bytes(payload.into_bytes()), *duration)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One logged render call.
#[derive(Clone, Debug)]
pub struct RenderRecord {
    pub target: TargetId,
    pub payload: String,
}

impl RenderRecord {
    /// Frame index encoded in the payload by [`ScriptedDecoder`].
    pub fn frame_index(&self) -> Option<usize> {
        self.payload.rsplit('#').next()?.parse().ok()
    }
}

/// Renderer that records every call; individual targets can be marked
/// dead to make later renders for them fail.
#[derive(Default)]
pub struct RecordingRenderer {
    records: Mutex<Vec<RenderRecord>>,
    dead: Mutex<HashSet<TargetId>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Marks `target` dead: every later render for it fails.
    pub fn kill(&self, target: TargetId) {
        self.dead.lock().expect("dead set poisoned").insert(target);
    }

    pub fn records(&self) -> Vec<RenderRecord> {
        self.records.lock().expect("render log poisoned").clone()
    }

    pub fn render_count(&self) -> usize {
        self.records.lock().expect("render log poisoned").len()
    }

    /// Frame indices rendered for `target`, in call order.
    pub fn frame_indices(&self, target: TargetId) -> Vec<usize> {
        self.records
            .lock()
            .expect("render log poisoned")
            .iter()
            .filter(|record| record.target == target)
            .filter_map(RenderRecord::frame_index)
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().expect("render log poisoned").clear();
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, target: TargetId, image: &Image) -> Result<(), RenderError> {
        if self.dead.lock().expect("dead set poisoned").contains(&target) {
            return Err(RenderError::target_gone("surface disposed by host"));
        }
        let payload = String::from_utf8_lossy(image.as_bytes()).into_owned();
        self.records
            .lock()
            .expect("render log poisoned")
            .push(RenderRecord { target, payload });
        Ok(())
    }
}
