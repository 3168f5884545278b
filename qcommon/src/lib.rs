//! Shared utilities for the qllm workspace crates.
//!
//! ```rust
//! use qcommon::{Registry, generate_id, truncate};
//!
//! let mut registry = Registry::new();
//! registry.insert("openai".to_string(), 1_u32);
//!
//! assert_eq!(registry.get("openai"), Some(&1));
//! assert!(!generate_id().is_empty());
//! assert_eq!(truncate("abcdef", 3), "abc...");
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use qcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod ids {
    //! Identifier generation shared by conversations and locally minted tool calls.
    //!
    //! Identifiers are UUIDv7 strings, so they sort by creation time.

    use uuid::Uuid;

    pub fn generate_id() -> String {
        Uuid::now_v7().to_string()
    }

    /// Tool-call ids for backends that do not report one.
    pub fn generate_tool_call_id() -> String {
        format!("call_{}", Uuid::now_v7().simple())
    }
}

pub mod text {
    //! Small string helpers.

    /// Cuts `input` to at most `max` bytes on a char boundary, appending `...` when cut.
    pub fn truncate(input: &str, max: usize) -> String {
        if input.len() <= max {
            return input.to_string();
        }

        let mut end = max;
        while !input.is_char_boundary(end) {
            end -= 1;
        }

        let mut output = input[..end].to_string();
        output.push_str("...");
        output
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.
    //!
    //! ```rust
    //! use qcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert!(registry.contains_key("alpha"));
    //! ```

    use std::borrow::Borrow;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: BTreeMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Ord,
    {
        fn default() -> Self {
            Self {
                items: BTreeMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Ord,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            self.items.get(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            self.items.remove(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            self.items.contains_key(key)
        }

        /// Keys in sorted order.
        pub fn keys(&self) -> impl Iterator<Item = &K> {
            self.items.keys()
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.items.values()
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use future::BoxFuture;
pub use ids::{generate_id, generate_tool_call_id};
pub use registry::Registry;
pub use text::truncate;
