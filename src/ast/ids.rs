use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// The ID for a node in storage.
pub struct Id<T> {
    value: u32,
    _data: PhantomData<fn(&[T]) -> &T>,
}

impl<T> Id<T> {
    /// Construct an ID from a dense index.
    pub(crate) fn new(index: usize) -> Self {
        let value = u32::try_from(index)
            .expect("IDs always fit within 'u32'!");
        Self { value, _data: PhantomData }
    }

    /// The dense index of the identified node.
    pub fn index(self) -> usize {
        self.value as usize
    }
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.value)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}
