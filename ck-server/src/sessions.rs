use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ck_gen::RecipeSession;
use quick_cache::sync::Cache;

/// Bounded in-memory session store. Nothing generated outlives eviction;
/// there is deliberately no persistence.
pub type CKSessions = Arc<Cache<u64, Arc<RecipeSession>>>;

pub fn new_session_store() -> CKSessions {
    Arc::new(Cache::new(64))
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst)
}
