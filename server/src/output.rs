// Copies of synthesized audio written to the output directory

use std::path::Path;

use tracing::{debug, warn};

/// `tts_<8 hex chars>.wav`
pub fn output_filename() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("tts_{}.wav", &id[..8])
}

/// Write `audio` to `dir/filename`. Failure is logged and reported as `false`;
/// it never fails the request.
pub async fn persist(dir: &Path, filename: &str, audio: &[u8]) -> bool {
    let path = dir.join(filename);
    match tokio::fs::write(&path, audio).await {
        Ok(()) => {
            debug!("Saved {} bytes to {}", audio.len(), path.display());
            true
        }
        Err(e) => {
            warn!("Could not save output {}: {}", path.display(), e);
            false
        }
    }
}
