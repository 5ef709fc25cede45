use crate::transaction::TransactionForest;

/// Storage that can sit behind a [`CaptureBuffer`].
pub trait Buffered: Default {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Buffered for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl Buffered for TransactionForest {
    fn len(&self) -> usize {
        TransactionForest::len(self)
    }
}

/// Lazily materialised capture buffer.
///
/// A buffer that was never touched is *absent*, which is distinct from one
/// that was materialised and then drained. Leak detection only cares whether
/// anything is still *populated*.
#[derive(Clone, Debug, Default)]
pub struct CaptureBuffer<B> {
    inner: Option<B>,
}

impl<B: Buffered> CaptureBuffer<B> {
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Materialises the buffer on first use.
    pub fn get_or_init(&mut self) -> &mut B {
        self.inner.get_or_insert_with(B::default)
    }

    pub fn get(&self) -> Option<&B> {
        self.inner.as_ref()
    }

    /// Moves the contents out, leaving the buffer materialised but empty.
    ///
    /// An absent buffer stays absent.
    pub fn take(&mut self) -> B {
        match self.inner.as_mut() {
            Some(inner) => std::mem::take(inner),
            None => B::default(),
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.inner.is_some()
    }

    pub fn is_populated(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| !inner.is_empty())
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, Buffered::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> CaptureBuffer<Vec<T>> {
    pub fn push(&mut self, item: T) {
        self.get_or_init().push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_differs_from_drained() {
        let mut buffer: CaptureBuffer<Vec<u32>> = CaptureBuffer::new();
        assert!(!buffer.is_materialized());
        assert!(buffer.take().is_empty());
        assert!(!buffer.is_materialized());

        buffer.push(1);
        buffer.push(2);
        assert!(buffer.is_populated());
        assert_eq!(buffer.take(), vec![1, 2]);
        assert!(buffer.is_materialized());
        assert!(!buffer.is_populated());
    }
}
