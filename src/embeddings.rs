//! Keyword-driven approximate embeddings.
//!
//! Vectors are normalized term frequencies laid out over a vocabulary that grows
//! until it fills the configured dimension. Tokens seen after that point share
//! slots through a CRC32 hash. Similarity between vectors reflects shared
//! keywords, not semantic understanding.

use std::collections::HashMap;
use std::sync::Mutex;

/// Default vector length.
pub const DEFAULT_DIMENSIONS: usize = 512;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "does", "for",
    "from", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "of", "on", "or",
    "so", "than", "that", "the", "their", "then", "there", "these", "this", "to", "was", "were",
    "what", "when", "which", "will", "with", "you", "your",
];

#[derive(Debug, Default)]
struct Vocabulary {
    slots: HashMap<String, usize>,
}

impl Vocabulary {
    fn slot_for(&mut self, token: &str, dimensions: usize) -> usize {
        if let Some(&slot) = self.slots.get(token) {
            return slot;
        }
        if self.slots.len() < dimensions {
            let slot = self.slots.len();
            self.slots.insert(token.to_string(), slot);
            return slot;
        }
        hashed_slot(token, dimensions)
    }
}

/// Turns text into fixed-length term-frequency vectors.
///
/// The vocabulary is shared by every call on the same instance, so vectors are
/// only comparable when produced by the same service.
#[derive(Debug)]
pub struct EmbeddingService {
    dimensions: usize,
    vocabulary: Mutex<Vocabulary>,
}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingService {
    /// Creates a service producing vectors of `dimensions` entries (at least one).
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            vocabulary: Mutex::new(Vocabulary::default()),
        }
    }

    /// Length of every produced vector.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of tokens that own a dedicated slot.
    pub fn vocabulary_len(&self) -> usize {
        self.lock_vocabulary().slots.len()
    }

    /// Embeds `text` into an L2-normalized vector; empty input yields the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        let total = tokens.len() as f32;
        let mut vocabulary = self.lock_vocabulary();
        for (token, count) in term_counts(&tokens) {
            let slot = vocabulary.slot_for(token, self.dimensions);
            // colliding tokens overwrite each other
            vector[slot] = count as f32 / total;
        }
        drop(vocabulary);

        normalize(&mut vector);
        vector
    }

    /// Embeds each text in order; vocabulary growth carries across entries.
    pub fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text.as_ref())).collect()
    }

    fn lock_vocabulary(&self) -> std::sync::MutexGuard<'_, Vocabulary> {
        self.vocabulary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cosine similarity of two vectors; 0 when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    similarity.clamp(-1.0, 1.0) as f32
}

/// Lowercases, splits on non-alphanumerics and drops stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty() && !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

fn term_counts(tokens: &[String]) -> Vec<(&str, usize)> {
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        match positions.get(token.as_str()) {
            Some(&idx) => order[idx].1 += 1,
            None => {
                positions.insert(token.as_str(), order.len());
                order.push((token.as_str(), 1));
            }
        }
    }
    order
}

fn hashed_slot(token: &str, dimensions: usize) -> usize {
    crc32fast::hash(token.as_bytes()) as usize % dimensions
}

fn normalize(vector: &mut [f32]) {
    let magnitude = vector
        .iter()
        .map(|value| (*value as f64) * (*value as f64))
        .sum::<f64>()
        .sqrt();
    if magnitude == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value = (*value as f64 / magnitude) as f32;
    }
}
