use std::{error::Error, fmt, sync::Arc};

/// The error returned by the client and by every exchange.
///
/// It wraps whatever error a layer produced, so exchanges can use `?` on their own error types.
/// Cloning is cheap, which lets one failure be handed to several callers.
#[derive(Clone, Debug)]
pub struct QueryError {
    inner: Arc<dyn Error + Send + Sync>
}

/// A wrapper implementing `std::error::Error`, for use with error libraries that require it.
#[derive(Debug)]
pub struct QueryErrorCompat(QueryError);

impl Error for QueryErrorCompat {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.inner())
    }
}

impl fmt::Display for QueryErrorCompat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl QueryError {
    /// The underlying error.
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.inner
    }

    pub fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }

    /// Attempt to view the underlying error as a concrete type.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner().downcast_ref::<E>()
    }

    pub fn compat(self) -> QueryErrorCompat {
        QueryErrorCompat(self)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<T: Error + Send + Sync + 'static> From<T> for QueryError {
    fn from(e: T) -> Self {
        QueryError { inner: Arc::new(e) }
    }
}

#[cfg(test)]
mod tests {
    use super::QueryError;
    use std::fmt;

    #[derive(Debug, PartialEq)]
    struct Boom;
    impl std::error::Error for Boom {}
    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    #[test]
    fn wraps_and_downcasts() {
        let error: QueryError = Boom.into();
        let cloned = error.clone();

        assert_eq!(cloned.to_string(), "boom");
        assert_eq!(error.downcast_ref::<Boom>(), Some(&Boom));
        assert!(error.compat().to_string() == "boom");
    }
}
