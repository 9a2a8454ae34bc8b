//! Session-scoped client state behind an injected key-value port.
//!
//! Cart, wishlist and last-checked pincode survive page reloads within
//! a session. The store is constructed explicitly per session and
//! handed to callers — nothing reads it ambiently — so tests can supply
//! the in-memory fake.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::delivery::{pincode_to_remember, Serviceability};
use crate::domain::value_objects::Pincode;
use crate::EngineError;

const CART_KEY: &str = "cart";
const WISHLIST_KEY: &str = "wishlist";
const PINCODE_KEY: &str = "last_pincode";

/// Generic session key-value persistence.
#[async_trait]
pub trait KeyValuePort: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> crate::Result<Option<String>>;
    async fn set(&self, session_id: &str, key: &str, value: String) -> crate::Result<()>;
    async fn remove(&self, session_id: &str, key: &str) -> crate::Result<()>;
}

/// In-memory port for tests and single-process setups.
#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> crate::Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.entries
            .lock()
            .map_err(|_| EngineError::Unreachable("session store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValuePort for InMemoryKv {
    async fn get(&self, session_id: &str, key: &str) -> crate::Result<Option<String>> {
        Ok(self
            .lock()?
            .get(&(session_id.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: String) -> crate::Result<()> {
        self.lock()?
            .insert((session_id.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> crate::Result<()> {
        self.lock()?
            .remove(&(session_id.to_string(), key.to_string()));
        Ok(())
    }
}

/// Postgres-backed port over the `session_state` table.
pub struct PgKv {
    pool: PgPool,
}

impl PgKv {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unreachable_err(e: sqlx::Error) -> EngineError {
    EngineError::Unreachable(e.to_string())
}

#[async_trait]
impl KeyValuePort for PgKv {
    async fn get(&self, session_id: &str, key: &str) -> crate::Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM session_state WHERE session_id = $1 AND key = $2")
                .bind(session_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(unreachable_err)?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, session_id: &str, key: &str, value: String) -> crate::Result<()> {
        sqlx::query(
            "INSERT INTO session_state (session_id, key, value, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (session_id, key) DO UPDATE SET value = $3, updated_at = NOW()",
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(unreachable_err)?;
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> crate::Result<()> {
        sqlx::query("DELETE FROM session_state WHERE session_id = $1 AND key = $2")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(unreachable_err)?;
        Ok(())
    }
}

/// One shopper's persisted state: cart, wishlist, last-checked pincode.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValuePort>,
    session_id: String,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValuePort>, session_id: impl Into<String>) -> Self {
        Self {
            kv,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Loads the cart, starting fresh when nothing is stored. A payload
    /// that no longer deserializes is logged and treated as empty rather
    /// than wedging the session.
    pub async fn load_cart(&self) -> crate::Result<Cart> {
        match self.kv.get(&self.session_id, CART_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(cart) => Ok(cart),
                Err(e) => {
                    tracing::warn!(session = %self.session_id, error = %e, "discarding unreadable stored cart");
                    Ok(Cart::new())
                }
            },
            None => Ok(Cart::new()),
        }
    }

    pub async fn save_cart(&self, cart: &Cart) -> crate::Result<()> {
        let raw = serde_json::to_string(cart)
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;
        self.kv.set(&self.session_id, CART_KEY, raw).await
    }

    pub async fn clear_cart(&self) -> crate::Result<()> {
        self.kv.remove(&self.session_id, CART_KEY).await
    }

    pub async fn wishlist(&self) -> crate::Result<Vec<Uuid>> {
        match self.kv.get(&self.session_id, WISHLIST_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
            None => Ok(vec![]),
        }
    }

    /// Adds or removes a product from the wishlist; returns whether the
    /// product is on the list afterwards.
    pub async fn toggle_wishlist(&self, product_id: Uuid) -> crate::Result<bool> {
        let mut list = self.wishlist().await?;
        let present = if let Some(pos) = list.iter().position(|id| *id == product_id) {
            list.remove(pos);
            false
        } else {
            list.push(product_id);
            true
        };
        let raw = serde_json::to_string(&list)
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;
        self.kv.set(&self.session_id, WISHLIST_KEY, raw).await?;
        Ok(present)
    }

    pub async fn last_pincode(&self) -> crate::Result<Option<Pincode>> {
        match self.kv.get(&self.session_id, PINCODE_KEY).await? {
            Some(raw) => Ok(Pincode::parse(raw).ok()),
            None => Ok(None),
        }
    }

    /// Persists the pincode only when the check succeeded; failed or
    /// unavailable checks leave the previously confirmed location alone.
    pub async fn remember_pincode(
        &self,
        checked: &Pincode,
        result: &Serviceability,
    ) -> crate::Result<()> {
        if let Some(pin) = pincode_to_remember(checked, result) {
            self.kv
                .set(&self.session_id, PINCODE_KEY, pin.as_str().to_string())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::{ColorVariant, Product};
    use crate::domain::fulfillment::{FulfillmentMode, FulfillmentType};
    use crate::domain::value_objects::Money;
    use rust_decimal::Decimal;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(InMemoryKv::new()), "sess-1")
    }

    #[tokio::test]
    async fn test_cart_round_trip() {
        let store = store();
        assert!(store.load_cart().await.unwrap().is_empty());

        let mut p = Product::create(
            "Linen Sofa",
            "sofas",
            Money::inr(Decimal::new(5000, 0)),
            FulfillmentType::Hybrid,
        );
        p.add_color_variant(ColorVariant::new("Black", "#111111", 10)).unwrap();
        let mut cart = Cart::new();
        cart.add_line(&p, 2, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();

        store.save_cart(&cart).await.unwrap();
        let loaded = store.load_cart().await.unwrap();
        assert_eq!(loaded.line_count(), 1);
        assert_eq!(loaded.lines()[0].quantity.value(), 2);

        store.clear_cart().await.unwrap();
        assert!(store.load_cart().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_cart_is_discarded() {
        let kv = Arc::new(InMemoryKv::new());
        kv.set("sess-1", "cart", "{not json".to_string()).await.unwrap();
        let store = SessionStore::new(kv, "sess-1");
        assert!(store.load_cart().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wishlist_toggle() {
        let store = store();
        let id = Uuid::now_v7();
        assert!(store.toggle_wishlist(id).await.unwrap());
        assert_eq!(store.wishlist().await.unwrap(), vec![id]);
        assert!(!store.toggle_wishlist(id).await.unwrap());
        assert!(store.wishlist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_check_keeps_previous_pincode() {
        let store = store();
        let good = Pincode::parse("380001").unwrap();
        store
            .remember_pincode(&good, &Serviceability::available("Ahmedabad", "Gujarat"))
            .await
            .unwrap();
        assert_eq!(store.last_pincode().await.unwrap(), Some(good.clone()));

        let other = Pincode::parse("110001").unwrap();
        store
            .remember_pincode(&other, &Serviceability::unavailable())
            .await
            .unwrap();
        assert_eq!(store.last_pincode().await.unwrap(), Some(good));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let kv: Arc<dyn KeyValuePort> = Arc::new(InMemoryKv::new());
        let a = SessionStore::new(Arc::clone(&kv), "sess-a");
        let b = SessionStore::new(Arc::clone(&kv), "sess-b");
        let id = Uuid::now_v7();
        a.toggle_wishlist(id).await.unwrap();
        assert!(b.wishlist().await.unwrap().is_empty());
    }
}
