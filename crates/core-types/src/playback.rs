//! Choosing which recording to play for a species.
//!
//! Calls are either remote URLs or files in the local audio tree. When a
//! species has both, the local file wins: it is strictly faster than a remote
//! fetch. A local call whose file has gone missing is skipped.

use crate::structs::Call;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    Local(PathBuf),
    Remote(String),
}

impl Call {
    /// Where this call's audio lives, according to its `local_file` flag.
    pub fn source(&self) -> AudioSource {
        if self.local_file {
            AudioSource::Local(PathBuf::from(&self.audio_url))
        } else {
            AudioSource::Remote(self.audio_url.clone())
        }
    }
}

/// Picks the call to play: the first local call whose file exists, otherwise
/// the first remote call. Returns `None` when nothing is playable.
///
/// `exists` is injected so callers can resolve paths against their own audio
/// root (and so tests don't need a filesystem).
pub fn preferred_call<'a, F>(calls: &'a [Call], exists: F) -> Option<(&'a Call, AudioSource)>
where
    F: Fn(&Path) -> bool,
{
    let local = calls.iter().find_map(|call| match call.source() {
        AudioSource::Local(path) if exists(&path) => Some((call, AudioSource::Local(path))),
        _ => None,
    });

    local.or_else(|| {
        calls
            .iter()
            .find(|call| !call.local_file)
            .map(|call| (call, call.source()))
    })
}
