//! Deterministic store-key construction.
//!
//! Every key the engine touches has the shape `namespace:type:rest`. The
//! namespace segment is omitted when the namespace is empty. Same inputs
//! always yield the same key.

/// Builds namespaced store keys for one entity type.
///
/// # Examples
///
/// ```
/// use kvorm::KeyBuilder;
///
/// let keys = KeyBuilder::new("kvorm", "user");
/// assert_eq!(keys.object("1234"), "kvorm:user:object:1234");
/// assert_eq!(keys.all(), "kvorm:user:__all__");
///
/// let bare = KeyBuilder::new("", "user");
/// assert_eq!(bare.object("1234"), "user:object:1234");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: String,
    type_name: String,
}

impl KeyBuilder {
    /// Creates a key builder for the given namespace and entity-type name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
        }
    }

    /// The entity-type name this builder serves.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn build(&self, rest: &str) -> String {
        if self.namespace.is_empty() {
            format!("{}:{}", self.type_name, rest)
        } else {
            format!("{}:{}:{}", self.namespace, self.type_name, rest)
        }
    }

    /// Membership set holding every live id of this type.
    #[must_use]
    pub fn all(&self) -> String {
        self.build("__all__")
    }

    /// Sorted set mapping id to expiration timestamp.
    #[must_use]
    pub fn expire_index(&self) -> String {
        self.build("__expire__")
    }

    /// The serialized field bag of one entity.
    #[must_use]
    pub fn object(&self, id: &str) -> String {
        self.build(&format!("object:{id}"))
    }

    /// The stored expiration timestamp of one entity.
    #[must_use]
    pub fn object_expire(&self, id: &str) -> String {
        self.build(&format!("object:{id}:expire"))
    }

    /// Forward index: the set of tags attached to one entity.
    #[must_use]
    pub fn object_tags(&self, id: &str) -> String {
        self.build(&format!("object:{id}:tags"))
    }

    /// Inverted index: the set of entity ids carrying one tag.
    #[must_use]
    pub fn tag(&self, tag: &str) -> String {
        self.build(&format!("tags:{tag}"))
    }

    /// Glob pattern matching every subordinate key of one entity
    /// (expire, tags).
    #[must_use]
    pub fn object_subkeys(&self, id: &str) -> String {
        self.build(&format!("object:{id}:*"))
    }

    /// Glob pattern matching every key of this type.
    #[must_use]
    pub fn wildcard(&self) -> String {
        self.build("*")
    }
}
