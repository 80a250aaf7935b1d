//! Text encoders and the lazy holder the matcher borrows them through.
//!
//! Any backend that turns strings into fixed-length vectors can implement
//! [`TextEncoder`]: a neural sentence embedder, a remote service, or the
//! built-in [`NgramEncoder`]. Expensive backends are wrapped in an
//! [`EncoderCell`], which builds the backend on first use, at most once, even
//! when several documents are processed on different threads.
//!
//! Similarity is cosine over the returned vectors, clamped to `0..=1`.

use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock, PoisonError};

use rustc_hash::FxHasher;

use crate::error::EncoderError;
use crate::normalize::fold_tokens;

/// Backend that embeds strings as vectors.
///
/// `encode` returns one vector per input, in input order, all of the same
/// length. Implementations must be safe for concurrent read-only use.
pub trait TextEncoder: Send + Sync {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Encode a batch of texts.
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError>;
}

// ---------------------------------------------------------------------------
// Lazy holder
// ---------------------------------------------------------------------------

type Factory<E> = Box<dyn Fn() -> Result<E, EncoderError> + Send + Sync>;

/// Thread-safe get-or-create holder for an encoder.
///
/// The factory runs at most once on success. A failed initialization is not
/// cached: the next caller retries, also after a factory panic.
pub struct EncoderCell<E> {
    encoder: OnceLock<E>,
    init_lock: Mutex<()>,
    factory: Factory<E>,
}

impl<E: TextEncoder> EncoderCell<E> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<E, EncoderError> + Send + Sync + 'static,
    {
        EncoderCell {
            encoder: OnceLock::new(),
            init_lock: Mutex::new(()),
            factory: Box::new(factory),
        }
    }

    /// The encoder, building it on first call.
    pub fn get(&self) -> Result<&E, EncoderError> {
        if let Some(encoder) = self.encoder.get() {
            return Ok(encoder);
        }

        // The lock guards no data, so a poisoned lock is still usable.
        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Another thread may have finished while we waited for the lock.
        if let Some(encoder) = self.encoder.get() {
            return Ok(encoder);
        }

        let encoder = (self.factory)()?;
        log::info!("loaded text encoder `{}`", encoder.name());
        Ok(self.encoder.get_or_init(|| encoder))
    }

    pub fn is_initialized(&self) -> bool {
        self.encoder.get().is_some()
    }
}

impl<E: TextEncoder> TextEncoder for EncoderCell<E> {
    fn name(&self) -> &str {
        self.encoder.get().map_or("uninitialized", |e| e.name())
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        self.get()?.encode(texts)
    }
}

impl<E> std::fmt::Debug for EncoderCell<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderCell")
            .field("initialized", &self.encoder.get().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in lexical encoder
// ---------------------------------------------------------------------------

pub const DEFAULT_NGRAM_DIMS: usize = 512;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Hashed bag of word unigrams and padded character trigrams.
///
/// Case and diacritics are folded away, so `"MYOCARDITIS"` and
/// `"Myocarditis"` encode identically. Deterministic across runs and
/// platforms.
#[derive(Debug, Clone)]
pub struct NgramEncoder {
    dims: usize,
}

impl Default for NgramEncoder {
    fn default() -> Self {
        NgramEncoder {
            dims: DEFAULT_NGRAM_DIMS,
        }
    }
}

impl NgramEncoder {
    pub fn new(dims: usize) -> Result<Self, EncoderError> {
        if dims == 0 {
            return Err(EncoderError::Init(
                "ngram encoder needs at least one dimension".to_string(),
            ));
        }
        Ok(NgramEncoder { dims })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn bucket(&self, kind: u8, feature: &str) -> usize {
        let mut hasher = FxHasher::default();
        kind.hash(&mut hasher);
        feature.hash(&mut hasher);
        (hasher.finish() % self.dims as u64) as usize
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in fold_tokens(text) {
            vector[self.bucket(b'w', &token)] += WORD_WEIGHT;

            let padded: Vec<char> = format!("<{}>", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(b'c', &trigram)] += TRIGRAM_WEIGHT;
            }
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl TextEncoder for NgramEncoder {
    fn name(&self) -> &str {
        "ngram"
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity clamped to `0..=1`. Zero vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}
