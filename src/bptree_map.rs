use core::fmt;
use core::marker::PhantomData;
use core::ops::{Bound, RangeBounds};

use tracing::trace;

use crate::error::{Result, TreeError};
use crate::key_transform::{Identity, KeyTransform};
use crate::raw::RawBPlusTreeMap;

mod iter;

pub use iter::{Iter, Keys, Range, Values};

/// An ordered map backed by an in-memory B+ tree.
///
/// All entries live in leaf nodes linked into an ascending chain, so range
/// scans and full iteration stream through contiguous leaves instead of
/// re-descending the tree. The branching `order` (the most entries a node
/// may hold) is chosen at construction and must be at least 3; large orders
/// in the hundreds keep the tree shallow and cache-friendly.
///
/// Keys pass through a [`KeyTransform`] on every operation. The default
/// [`Identity`] stores keys as given; a custom transform derives the stored
/// key from the raw one, such as a normalized or bucketed form. Raw keys
/// that collide after transformation are one key as far as the map is
/// concerned.
///
/// # Examples
///
/// ```
/// use tilia::{BPlusTreeMap, TreeError};
///
/// let mut map = BPlusTreeMap::new(16)?;
/// map.insert(3, "c")?;
/// map.insert(1, "a")?;
/// map.insert(2, "b")?;
///
/// assert_eq!(map.insert(2, "again"), Err(TreeError::DuplicateKey));
/// assert_eq!(map.search(&2), Ok(&"b"));
/// assert_eq!(map.len(), 3);
///
/// let keys: Vec<i32> = map.keys().copied().collect();
/// assert_eq!(keys, [1, 2, 3]);
/// # Ok::<(), tilia::TreeError>(())
/// ```
pub struct BPlusTreeMap<R, V, T: KeyTransform<R> = Identity> {
    raw: RawBPlusTreeMap<T::Key, V>,
    transform: T,
    raw_key: PhantomData<fn(&R)>,
}

impl<R: Ord + Clone, V> BPlusTreeMap<R, V> {
    /// Creates an empty map with the given branching order, storing raw
    /// keys unchanged.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::InvalidOrder`] if `order < 3`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::{BPlusTreeMap, TreeError};
    ///
    /// let map: BPlusTreeMap<u64, &str> = BPlusTreeMap::new(1000)?;
    /// assert!(map.is_empty());
    ///
    /// assert_eq!(
    ///     BPlusTreeMap::<u64, &str>::new(2).err(),
    ///     Some(TreeError::InvalidOrder { order: 2 }),
    /// );
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn new(order: usize) -> Result<Self> {
        Self::with_key_transform(order, Identity)
    }
}

impl<R, V, T: KeyTransform<R>> BPlusTreeMap<R, V, T> {
    /// Creates an empty map that passes every raw key through `transform`
    /// before storing or comparing it.
    ///
    /// The transform must be pure and deterministic; it runs exactly once
    /// per raw key on each operation.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::InvalidOrder`] if `order < 3`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// // Keys are grouped into buckets of one hundred.
    /// let mut map = BPlusTreeMap::with_key_transform(16, |raw: &u32| raw / 100)?;
    /// map.insert(125, "first")?;
    /// assert!(map.contains_key(&199));
    /// assert!(!map.contains_key(&200));
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn with_key_transform(order: usize, transform: T) -> Result<Self> {
        if order < 3 {
            return Err(TreeError::InvalidOrder { order });
        }
        Ok(Self {
            raw: RawBPlusTreeMap::new(order),
            transform,
            raw_key: PhantomData,
        })
    }

    /// Returns the branching order the map was built with.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.raw.order()
    }

    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a")?;
    /// assert_eq!(map.len(), 1);
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Removes all entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// map.insert(1, "a")?;
    /// map.clear();
    /// assert!(map.is_empty());
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
        trace!(target: "tilia::map", "cleared map");
    }

    /// Inserts a fresh key, failing if the key is already bound.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::DuplicateKey`] if the transformed key is
    /// present; the map is left unchanged and the value is dropped. Use
    /// [`upsert`](Self::upsert) to overwrite instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::{BPlusTreeMap, TreeError};
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// map.insert(5, "a")?;
    /// assert_eq!(map.insert(5, "b"), Err(TreeError::DuplicateKey));
    /// assert_eq!(map.search(&5), Ok(&"a"));
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn insert(&mut self, key: R, value: V) -> Result<()> {
        let key = self.transform.transform(&key);
        if self.raw.try_insert(key, value) {
            trace!(target: "tilia::map", len = self.raw.len(), "inserted entry");
            Ok(())
        } else {
            Err(TreeError::DuplicateKey)
        }
    }

    /// Inserts or overwrites, returning the previous value if the key was
    /// already bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// assert_eq!(map.upsert(5, "a"), None);
    /// assert_eq!(map.upsert(5, "b"), Some("a"));
    /// assert_eq!(map.search(&5), Ok(&"b"));
    /// assert_eq!(map.len(), 1);
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn upsert(&mut self, key: R, value: V) -> Option<V> {
        let key = self.transform.transform(&key);
        let replaced = self.raw.upsert(key, value);
        trace!(
            target: "tilia::map",
            len = self.raw.len(),
            replaced = replaced.is_some(),
            "upserted entry"
        );
        replaced
    }

    /// Returns the value bound to `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::KeyNotFound`] if the key is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::{BPlusTreeMap, TreeError};
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// map.insert(1, "a")?;
    /// assert_eq!(map.search(&1), Ok(&"a"));
    /// assert_eq!(map.search(&2), Err(TreeError::KeyNotFound));
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn search(&self, key: &R) -> Result<&V> {
        self.get(key).ok_or(TreeError::KeyNotFound)
    }

    /// Returns the value bound to `key`, or `None` if the key is absent.
    ///
    /// The `Option` twin of [`search`](Self::search).
    #[must_use]
    pub fn get(&self, key: &R) -> Option<&V> {
        let key = self.transform.transform(key);
        self.raw.get(&key)
    }

    /// Returns `true` if `key` is bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// map.insert(1, "a")?;
    /// assert!(map.contains_key(&1));
    /// assert!(!map.contains_key(&2));
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    #[must_use]
    pub fn contains_key(&self, key: &R) -> bool {
        let key = self.transform.transform(key);
        self.raw.contains_key(&key)
    }

    /// Removes `key`, returning the value it was bound to.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::KeyNotFound`] if the key is absent; the map
    /// is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::{BPlusTreeMap, TreeError};
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// map.insert(1, "a")?;
    /// assert_eq!(map.remove(&1), Ok("a"));
    /// assert_eq!(map.remove(&1), Err(TreeError::KeyNotFound));
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn remove(&mut self, key: &R) -> Result<V> {
        let key = self.transform.transform(key);
        match self.raw.remove(&key) {
            Some(value) => {
                trace!(target: "tilia::map", len = self.raw.len(), "removed entry");
                Ok(value)
            }
            None => Err(TreeError::KeyNotFound),
        }
    }

    /// Iterates over all entries in ascending key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// for key in [3, 1, 2] {
    ///     map.insert(key, key * 10)?;
    /// }
    /// let entries: Vec<(i32, i32)> = map.iter().map(|(&k, &v)| (k, v)).collect();
    /// assert_eq!(entries, [(1, 10), (2, 20), (3, 30)]);
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn iter(&self) -> Iter<'_, T::Key, V> {
        Iter::new(&self.raw)
    }

    /// Iterates over all keys in ascending order.
    pub fn keys(&self) -> Keys<'_, T::Key, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over all values in ascending key order.
    pub fn values(&self) -> Values<'_, T::Key, V> {
        Values { inner: self.iter() }
    }

    /// Iterates over the entries whose keys fall within `bounds`, ascending.
    ///
    /// Bounds are given as raw keys and transformed once each. An empty
    /// interval (upper bound at or below the lower) yields nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilia::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new(4)?;
    /// for key in 0..10 {
    ///     map.insert(key, key * key)?;
    /// }
    ///
    /// let squares: Vec<i32> = map.range(2..5).map(|(_, &v)| v).collect();
    /// assert_eq!(squares, [4, 9, 16]);
    ///
    /// let tail: Vec<i32> = map.range(8..).map(|(&k, _)| k).collect();
    /// assert_eq!(tail, [8, 9]);
    ///
    /// assert_eq!(map.range(5..5).count(), 0);
    /// # Ok::<(), tilia::TreeError>(())
    /// ```
    pub fn range<B>(&self, bounds: B) -> Range<'_, T::Key, V>
    where
        B: RangeBounds<R>,
    {
        let start = match bounds.start_bound() {
            Bound::Unbounded => self.raw.first_leaf().map(|leaf| (leaf, 0)),
            Bound::Included(raw) => self.raw.lower_bound(&self.transform.transform(raw)),
            Bound::Excluded(raw) => self.raw.upper_bound(&self.transform.transform(raw)),
        };
        let end = match bounds.end_bound() {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(raw) => Bound::Included(self.transform.transform(raw)),
            Bound::Excluded(raw) => Bound::Excluded(self.transform.transform(raw)),
        };
        Range::new(&self.raw, start, end)
    }
}

impl<'a, R, V, T: KeyTransform<R>> IntoIterator for &'a BPlusTreeMap<R, V, T> {
    type Item = (&'a T::Key, &'a V);
    type IntoIter = Iter<'a, T::Key, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<R, V, T> fmt::Debug for BPlusTreeMap<R, V, T>
where
    T: KeyTransform<R>,
    T::Key: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
