macro_rules! map {
    (
        $(#[$attrs:meta])*
        pub struct $name:ident(IndexMap<$key:ty, $value:ty, DefaultHashBuilder>);
    ) => {
        $(#[$attrs])*
        pub struct $name(IndexMap<$key, $value, DefaultHashBuilder>);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl IntoIterator for $name {
            type Item = ($key, $value);
            type IntoIter = indexmap::map::IntoIter<$key, $value>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = (&'a $key, &'a $value);
            type IntoIter = indexmap::map::Iter<'a, $key, $value>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl $name {
            #[doc = concat!("Creates an empty [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn new() -> Self {
                Self(IndexMap::with_hasher(DefaultHashBuilder::default()))
            }

            #[doc = concat!("Inserts an element into [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn insert(mut self, key: $key, value: $value) -> Self {
                self.0.insert(key, value);
                self
            }

            #[doc = concat!("Adds an element to [`", stringify!($name), "`].")]
            #[inline]
            pub fn add(&mut self, key: $key, value: $value) {
                self.0.insert(key, value);
            }

            #[doc = concat!("Checks whether [`", stringify!($name), "`] is empty.")]
            #[must_use]
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            #[doc = concat!("Returns the number of elements in [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            #[doc = concat!("Iterates over [`", stringify!($name), "`] in insertion order.")]
            #[inline]
            pub fn iter(&self) -> indexmap::map::Iter<'_, $key, $value> {
                self.0.iter()
            }
        }
    };
}

macro_rules! set {
    (
        $(#[$attrs:meta])*
        pub struct $name:ident(IndexSet<$value:ty, DefaultHashBuilder>);
    ) => {
        $(#[$attrs])*
        pub struct $name(IndexSet<$value, DefaultHashBuilder>);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl IntoIterator for $name {
            type Item = $value;
            type IntoIter = indexmap::set::IntoIter<$value>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = &'a $value;
            type IntoIter = indexmap::set::Iter<'a, $value>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl $name {
            #[doc = concat!("Creates an empty [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn new() -> Self {
                Self(IndexSet::with_hasher(DefaultHashBuilder::default()))
            }

            #[doc = concat!("Creates a [`", stringify!($name), "`] with a single element.")]
            #[must_use]
            #[inline]
            pub fn init(value: $value) -> Self {
                Self::new().insert(value)
            }

            #[doc = concat!("Inserts an element into [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn insert(mut self, value: $value) -> Self {
                self.0.insert(value);
                self
            }

            #[doc = concat!("Adds an element to [`", stringify!($name), "`].")]
            #[inline]
            pub fn add(&mut self, value: $value) -> bool {
                self.0.insert(value)
            }

            #[doc = concat!("Checks whether [`", stringify!($name), "`] contains an element.")]
            #[must_use]
            #[inline]
            pub fn contains(&self, value: &$value) -> bool {
                self.0.contains(value)
            }

            #[doc = concat!("Checks whether [`", stringify!($name), "`] is empty.")]
            #[must_use]
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            #[doc = concat!("Returns the number of elements in [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            #[doc = concat!("Iterates over [`", stringify!($name), "`] in insertion order.")]
            #[inline]
            pub fn iter(&self) -> indexmap::set::Iter<'_, $value> {
                self.0.iter()
            }
        }
    };
}

pub(crate) use map;
pub(crate) use set;
