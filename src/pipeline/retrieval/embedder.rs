use serde::{Deserialize, Serialize};

use super::similarity::l2_normalize;
use super::types::{EmbeddingBackend, EmbeddingModel, RetrievalConfig};
use super::EmbeddingError;

/// Vector size of the lexical hashing embedder.
pub const HASH_EMBEDDING_DIM: usize = 512;

/// Texts per `/api/embed` request.
const OLLAMA_EMBED_BATCH: usize = 64;

// ═══════════════════════════════════════════════════════════
// Ollama embedder (`/api/embed` on the local endpoint)
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings served by the same local Ollama instance as the chat models.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = OllamaEmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                EmbeddingError::Unavailable(format!("cannot connect to {}", self.base_url))
            } else {
                EmbeddingError::Backend(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::Unavailable(format!(
                "embedding model '{}' returned {status}: {body}",
                self.model
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .map_err(|e| EmbeddingError::Backend(format!("response parsing: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::Backend(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(OLLAMA_EMBED_BATCH) {
            out.extend(self.embed_chunk(chunk)?);
        }
        Ok(out)
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

// ═══════════════════════════════════════════════════════════
// Lexical hashing embedder (offline, deterministic)
// ═══════════════════════════════════════════════════════════

/// Feature-hashing embedder over lowercase word unigrams and bigrams.
///
/// Needs no model files or network, so it doubles as the deterministic
/// embedder in tests. Texts sharing most words land close together.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for feature in hash_features(text) {
            let hash = fnv1a(&feature);
            let index = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + ((hash >> 48) & 0xFF) as f32 / 255.0;
            vector[index] += sign * weight;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HASH_EMBEDDING_DIM)
    }
}

impl EmbeddingModel for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn name(&self) -> String {
        format!("hash:{}", self.dimension)
    }
}

/// 64-bit FNV-1a, stable across builds and platforms.
fn fnv1a(value: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in value.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn hash_features(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let mut features = Vec::with_capacity(words.len() * 2);
    for (i, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(i + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

// ═══════════════════════════════════════════════════════════
// Disabled / failing backend
// ═══════════════════════════════════════════════════════════

/// Backend that always fails, forcing the positional fallback.
pub struct UnavailableEmbedder {
    reason: String,
}

impl UnavailableEmbedder {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl EmbeddingModel for UnavailableEmbedder {
    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> String {
        "unavailable".to_string()
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX embedder (`onnx-embeddings` feature)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{EmbeddingError, EmbeddingModel};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Output width of all-MiniLM-L6-v2.
    pub const ONNX_EMBEDDING_DIM: usize = 384;

    /// Sentence embeddings from a local MiniLM ONNX export.
    ///
    /// `model_dir` must contain `model.onnx` and `tokenizer.json`.
    /// The session sits behind a Mutex because `Session::run` needs `&mut self`.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, EmbeddingError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            for path in [&model_path, &tokenizer_path] {
                if !path.exists() {
                    return Err(EmbeddingError::Unavailable(format!(
                        "missing {}",
                        path.display()
                    )));
                }
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| EmbeddingError::Unavailable(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| EmbeddingError::Unavailable(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    EmbeddingError::Unavailable(format!("ONNX load failed: {e}"))
                })?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| EmbeddingError::Unavailable(format!("Tokenizer load failed: {e}")))?;

            tracing::info!("ONNX embedder loaded from {}", model_dir.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Tokenize, run the model and mean-pool over the attention mask.
        fn infer(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            use ort::value::TensorRef;

            let backend = |e: String| EmbeddingError::Backend(e);

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| backend(format!("tokenization: {e}")))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> =
                encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let seq_len = input_ids.len();

            let ids = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| backend(e.to_string()))?;
            let mask = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(|e| backend(e.to_string()))?;
            let types = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(|e| backend(e.to_string()))?;

            let ids_tensor = TensorRef::from_array_view(&ids).map_err(|e| backend(e.to_string()))?;
            let mask_tensor =
                TensorRef::from_array_view(&mask).map_err(|e| backend(e.to_string()))?;
            let type_tensor =
                TensorRef::from_array_view(&types).map_err(|e| backend(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| backend("session lock poisoned".into()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| backend(format!("ONNX inference failed: {e}")))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| backend(format!("output extraction: {e}")))?;

            if shape.len() != 3 || shape[2] as usize != ONNX_EMBEDDING_DIM {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: ONNX_EMBEDDING_DIM,
                    got: shape.last().copied().unwrap_or_default() as usize,
                });
            }

            let mut pooled = vec![0.0f32; ONNX_EMBEDDING_DIM];
            let mut mask_sum = 0.0f32;
            for (token_idx, &m) in attention_mask.iter().enumerate().take(seq_len) {
                let m = m as f32;
                mask_sum += m;
                let offset = token_idx * ONNX_EMBEDDING_DIM;
                for (dim_idx, p) in pooled.iter_mut().enumerate() {
                    *p += data[offset + dim_idx] * m;
                }
            }
            if mask_sum > 0.0 {
                for v in &mut pooled {
                    *v /= mask_sum;
                }
            }
            Ok(pooled)
        }
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn name(&self) -> String {
            "onnx:all-MiniLM-L6-v2".to_string()
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

/// Build the configured embedding backend.
///
/// Construction failures do not abort the run: they produce an
/// `UnavailableEmbedder` so retrieval falls back to positional evidence.
pub fn build_embedder(
    config: &RetrievalConfig,
    base_url: &str,
    timeout_secs: u64,
) -> Box<dyn EmbeddingModel + Send + Sync> {
    let unavailable = |reason: String| -> Box<dyn EmbeddingModel + Send + Sync> {
        tracing::warn!(backend = config.backend.as_str(), %reason, "Embedding backend unavailable");
        Box::new(UnavailableEmbedder::new(&reason))
    };

    match config.backend {
        EmbeddingBackend::Ollama => {
            match OllamaEmbedder::new(base_url, &config.embed_model, timeout_secs) {
                Ok(e) => Box::new(e),
                Err(e) => unavailable(e.to_string()),
            }
        }
        EmbeddingBackend::Hash => Box::new(HashEmbedder::default()),
        EmbeddingBackend::None => unavailable("embedding disabled by configuration".into()),
        EmbeddingBackend::Onnx => build_onnx(config).unwrap_or_else(|e| unavailable(e.to_string())),
    }
}

#[cfg(feature = "onnx-embeddings")]
fn build_onnx(
    config: &RetrievalConfig,
) -> Result<Box<dyn EmbeddingModel + Send + Sync>, EmbeddingError> {
    let dir = config
        .onnx_model_dir
        .as_deref()
        .ok_or_else(|| EmbeddingError::Unavailable("no ONNX model directory configured".into()))?;
    Ok(Box::new(OnnxEmbedder::load(dir)?))
}

#[cfg(not(feature = "onnx-embeddings"))]
fn build_onnx(
    _config: &RetrievalConfig,
) -> Result<Box<dyn EmbeddingModel + Send + Sync>, EmbeddingError> {
    Err(EmbeddingError::Unavailable(
        "built without the onnx-embeddings feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retrieval::cosine_similarity;

    #[test]
    fn hash_embed_is_deterministic_and_normalized() {
        let e = HashEmbedder::default();
        let v1 = e.embed_text("Sample size was justified by a power analysis.");
        let v2 = e.embed_text("Sample size was justified by a power analysis.");
        assert_eq!(v1, v2);
        assert_eq!(v1.len(), HASH_EMBEDDING_DIM);
        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn hash_embed_ignores_case_and_punctuation() {
        let e = HashEmbedder::default();
        let a = e.embed_text("Patient-level split, external validation!");
        let b = e.embed_text("patientlevel SPLIT external validation");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hash_embed_related_texts_score_higher() {
        let e = HashEmbedder::default();
        let query = e.embed_text("sample size power calculation");
        let related = e.embed_text("The sample size was set by a power calculation.");
        let unrelated = e.embed_text("Images were acquired on a PET scanner.");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let v = HashEmbedder::new(16).embed_text("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn batch_returns_one_vector_per_text() {
        let vecs = HashEmbedder::default().embed_batch(&["a b", "c d", "e"]).unwrap();
        assert_eq!(vecs.len(), 3);
    }

    #[test]
    fn unavailable_embedder_always_fails() {
        let err = UnavailableEmbedder::new("offline").embed_batch(&["x"]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(ref r) if r == "offline"));
    }

    #[test]
    fn build_selects_backend() {
        let mut cfg = RetrievalConfig {
            backend: EmbeddingBackend::Hash,
            ..RetrievalConfig::default()
        };
        assert!(build_embedder(&cfg, "http://localhost:11434", 5).name().starts_with("hash"));

        cfg.backend = EmbeddingBackend::None;
        let e = build_embedder(&cfg, "http://localhost:11434", 5);
        assert!(e.embed_batch(&["x"]).is_err());

        cfg.backend = EmbeddingBackend::Ollama;
        cfg.embed_model = "nomic-embed-text".into();
        assert_eq!(
            build_embedder(&cfg, "http://localhost:11434/", 5).name(),
            "ollama:nomic-embed-text"
        );
    }

    #[test]
    fn fnv_is_stable() {
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_ne!(fnv1a("a"), fnv1a("b"));
    }
}
