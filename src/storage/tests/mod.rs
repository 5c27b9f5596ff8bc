// src/storage/tests/mod.rs


// Contract every counter store must satisfy, run against each backend
pub(crate) mod common {
    use crate::error::Result;
    use crate::storage::{AsyncCounterStore, CounterStore};

    /// Fresh namespace so runs against a shared server don't collide
    pub fn namespace() -> String {
        format!("premier-test-{}:", uuid::Uuid::new_v4())
    }

    pub fn check_blocking_contract<S: CounterStore + ?Sized>(store: &S, ns: &str) -> Result<()> {
        let key = format!("{}premier:fixed_window:app:f", ns);

        // Absent keys fall back to the default
        assert_eq!(store.get(&key)?, None);
        assert_eq!(store.get_or(&key, "{}")?, "{}");

        // Full replace
        store.set(&key, "one")?;
        store.set(&key, "two")?;
        assert_eq!(store.get(&key)?.as_deref(), Some("two"));

        // Compare-and-set only writes over the expected value
        assert!(!store.compare_and_set(&key, None, "three")?);
        assert!(!store.compare_and_set(&key, Some("one"), "three")?);
        assert!(store.compare_and_set(&key, Some("two"), "three")?);
        assert_eq!(store.get(&key)?.as_deref(), Some("three"));

        let fresh = format!("{}premier:token_bucket:app:g", ns);
        assert!(store.compare_and_set(&fresh, None, "1")?);
        assert!(!store.compare_and_set(&fresh, None, "2")?);

        // Prefix clear leaves unrelated keys alone
        let unrelated = format!("{}other:fixed_window:app:f", ns);
        store.set(&unrelated, "keep")?;
        store.clear(&format!("{}premier", ns))?;
        assert_eq!(store.get(&key)?, None);
        assert_eq!(store.get(&fresh)?, None);
        assert_eq!(store.get(&unrelated)?.as_deref(), Some("keep"));

        // Glob characters in the prefix are literal
        let starred = format!("{}we*rd:1", ns);
        let plain = format!("{}weird:1", ns);
        store.set(&starred, "x")?;
        store.set(&plain, "y")?;
        store.clear(&format!("{}we*rd", ns))?;
        assert_eq!(store.get(&starred)?, None);
        assert_eq!(store.get(&plain)?.as_deref(), Some("y"));

        store.clear(ns)?;
        assert_eq!(store.get(&unrelated)?, None);
        Ok(())
    }

    pub async fn check_async_contract<S: AsyncCounterStore + ?Sized>(
        store: &S,
        ns: &str,
    ) -> Result<()> {
        let key = format!("{}premier:sliding_window:app:f", ns);

        assert_eq!(store.get(&key).await?, None);
        assert_eq!(store.get_or(&key, "{}").await?, "{}");

        store.set(&key, "one").await?;
        assert!(!store.compare_and_set(&key, None, "two").await?);
        assert!(store.compare_and_set(&key, Some("one"), "two").await?);
        assert_eq!(store.get(&key).await?.as_deref(), Some("two"));

        let unrelated = format!("{}other:app:f", ns);
        store.set(&unrelated, "keep").await?;
        store.clear(&format!("{}premier", ns)).await?;
        assert_eq!(store.get(&key).await?, None);
        assert_eq!(store.get(&unrelated).await?.as_deref(), Some("keep"));

        store.clear(ns).await?;
        assert_eq!(store.get(&unrelated).await?, None);
        Ok(())
    }
}
