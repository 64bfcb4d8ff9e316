use crate::vton::{GenerationInput, GenerationMode, ProductContext};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

/// Legacy marker for "no model image".
pub const NO_MODEL_SENTINEL: &str = "NONE";

pub type PairId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Pending,
    Processing,
    Done,
    Error,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct Pair {
    pub id: PairId,
    pub model_url: Option<String>,
    pub garment_url: String,
    pub mode: GenerationMode,
    pub status: PairStatus,
    pub result_url: Option<String>,
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub fabric_hint: Option<String>,
    pub category: Option<String>,
}

impl Pair {
    pub fn generation_input(&self, product_title: Option<&str>) -> GenerationInput {
        GenerationInput {
            mode: self.mode,
            model_url: self.model_url.clone(),
            garment_url: self.garment_url.clone(),
            fabric_hint: self.fabric_hint.clone(),
            context: ProductContext::new(product_title, self.category.as_deref()),
        }
    }
}

/// Operator input for one pair.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPair {
    #[serde(default, deserialize_with = "model_url_or_sentinel")]
    pub model_url: Option<String>,
    pub garment_url: String,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub fabric_hint: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn model_url_or_sentinel<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != NO_MODEL_SENTINEL))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairError {
    #[error("garment_url must be an http(s) URL, got `{0}`")]
    InvalidGarmentUrl(String),
    #[error("model_url must be an http(s) URL, got `{0}`")]
    InvalidModelUrl(String),
    #[error("{mode} mode requires a model image")]
    MissingModelImage { mode: GenerationMode },
    #[error("pair {0} not found")]
    NotFound(PairId),
    #[error("pair {0} is being processed and cannot be removed")]
    Processing(PairId),
}

/// Insertion-ordered worklist. Pairs are appended and explicitly removed,
/// never reordered.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PairQueue {
    pairs: Vec<Pair>,
    #[serde(skip)]
    next_id: PairId,
}

impl PairQueue {
    pub fn add(&mut self, new: NewPair) -> Result<&Pair, PairError> {
        validate(&new)?;
        self.next_id += 1;
        self.pairs.push(Pair {
            id: self.next_id,
            model_url: new.model_url,
            garment_url: new.garment_url.trim().to_string(),
            mode: new.mode,
            status: PairStatus::Pending,
            result_url: None,
            job_id: None,
            error: None,
            fabric_hint: new.fabric_hint.filter(|h| !h.trim().is_empty()),
            category: new.category.filter(|c| !c.trim().is_empty()),
        });
        Ok(&self.pairs[self.pairs.len() - 1])
    }

    pub fn remove(&mut self, id: PairId) -> Result<Pair, PairError> {
        let index = self
            .pairs
            .iter()
            .position(|p| p.id == id)
            .ok_or(PairError::NotFound(id))?;
        if self.pairs[index].status == PairStatus::Processing {
            return Err(PairError::Processing(id));
        }
        Ok(self.pairs.remove(index))
    }

    /// Drop every pair. Ids keep counting so an old id never names a new pair.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn get(&self, id: PairId) -> Option<&Pair> {
        self.pairs.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PairId) -> Option<&mut Pair> {
        self.pairs.iter_mut().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<PairId> {
        self.pairs.iter().map(|p| p.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Result URLs of finished pairs, in queue order.
    pub fn results(&self) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|p| p.status == PairStatus::Done)
            .filter_map(|p| p.result_url.clone())
            .collect()
    }
}

fn validate(new: &NewPair) -> Result<(), PairError> {
    if !is_http_url(&new.garment_url) {
        return Err(PairError::InvalidGarmentUrl(new.garment_url.clone()));
    }
    match &new.model_url {
        Some(url) if !is_http_url(url) => Err(PairError::InvalidModelUrl(url.clone())),
        None if new.mode.requires_model() => Err(PairError::MissingModelImage { mode: new.mode }),
        _ => Ok(()),
    }
}

fn is_http_url(raw: &str) -> bool {
    reqwest::Url::parse(raw.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
