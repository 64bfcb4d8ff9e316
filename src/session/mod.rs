//! Per-operator workflow state: the scraped product, the pair queue and the
//! listing draft. Each session is independent; nothing here is persisted.

pub mod drain;
pub mod pairs;

use crate::listing::{ListingDraft, ScrapedProduct};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

pub use drain::{DrainSummary, drain_all};
pub use pairs::{NewPair, Pair, PairError, PairId, PairQueue, PairStatus};

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub product: Option<ScrapedProduct>,
    pub pairs: PairQueue,
    pub listing: ListingDraft,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            product: None,
            pairs: PairQueue::default(),
            listing: ListingDraft::default(),
        }
    }

    /// Drop the product, pairs and listing draft. The id and the pair id
    /// counter survive.
    pub fn reset(&mut self) {
        self.product = None;
        self.pairs.clear();
        self.listing = ListingDraft::default();
    }

    pub fn product_title(&self) -> Option<&str> {
        self.product.as_ref().map(|p| p.title.as_str())
    }

    /// Images offered for the listing when the operator sends none: finished
    /// pair results first, then the scraped images.
    pub fn default_listing_images(&self) -> Vec<String> {
        let mut images = self.pairs.results();
        if let Some(product) = &self.product {
            images.extend(product.images.iter().cloned());
        }
        images
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub async fn create(&self) -> SharedSession {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(id)));
        self.sessions.lock().await.insert(id, session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::SizeStock;
    use serde_json::json;

    fn fabric_pair() -> NewPair {
        serde_json::from_value(json!({"garment_url": "https://x/g.jpg", "mode": "fabric"})).unwrap()
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::default();
        let a = store.create().await;
        let b = store.create().await;
        let a_id = a.lock().await.id;
        let b_id = b.lock().await.id;
        assert_ne!(a_id, b_id);
        assert_eq!(store.len().await, 2);

        a.lock().await.listing.title = Some("A".into());
        let fetched = store.get(b_id).await.expect("b");
        assert_eq!(fetched.lock().await.listing.title, None);
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn reset_clears_state_but_keeps_pair_ids_counting() {
        let store = SessionStore::default();
        let shared = store.create().await;
        let mut session = shared.lock().await;
        let id = session.id;
        session.product = Some(ScrapedProduct {
            title: "T".into(),
            price: 1.0,
            product_code: "C".into(),
            images: vec![],
            sizes: vec![SizeStock {
                size: "S".into(),
                stock: 1,
            }],
        });
        session.pairs.add(fabric_pair()).unwrap();

        session.reset();

        assert_eq!(session.id, id);
        assert!(session.product.is_none());
        assert!(session.pairs.is_empty());

        let next = session.pairs.add(fabric_pair()).unwrap().id;
        assert_eq!(next, 2);
    }

    #[test]
    fn default_images_put_results_before_scraped() {
        let mut session = Session::new(Uuid::new_v4());
        session.product = Some(ScrapedProduct {
            title: "T".into(),
            price: 1.0,
            product_code: "C".into(),
            images: vec!["https://src/1.jpg".into()],
            sizes: vec![],
        });
        session.pairs.add(fabric_pair()).unwrap();
        let pair = session.pairs.get_mut(1).unwrap();
        pair.status = PairStatus::Done;
        pair.result_url = Some("https://cdn/out.png".into());

        assert_eq!(
            session.default_listing_images(),
            vec!["https://cdn/out.png", "https://src/1.jpg"]
        );
    }
}
