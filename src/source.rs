//! Lazy identifier source.
//!
//! [`LazySource`] wraps any iterator and hands out one element per `next()`
//! call, counting what it produced. Nothing is read ahead, so an unbounded
//! source (stdin, a database cursor) is never materialized.

use crate::{Error, Result};

/// Pull-based wrapper around an identifier source with a running count.
#[derive(Debug)]
pub struct LazySource<I> {
    inner: I,
    produced: u64,
}

impl<I: Iterator> LazySource<I> {
    pub fn new(source: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: source.into_iter(),
            produced: 0,
        }
    }
}

impl<I> LazySource<I> {
    /// Number of elements handed out so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl<I: Iterator> Iterator for LazySource<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.produced += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Conversion of source elements into normalized identifiers.
///
/// `Ok(None)` means "nothing to fetch" (a null or blank element) and is
/// skipped by the stream. Errors from fallible sources pass through as-is.
pub trait IntoIdentifier {
    fn into_identifier(self) -> Result<Option<String>>;
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl IntoIdentifier for String {
    fn into_identifier(self) -> Result<Option<String>> {
        Ok(normalize(&self))
    }
}

impl IntoIdentifier for &str {
    fn into_identifier(self) -> Result<Option<String>> {
        Ok(normalize(self))
    }
}

impl IntoIdentifier for &String {
    fn into_identifier(self) -> Result<Option<String>> {
        Ok(normalize(self))
    }
}

macro_rules! numeric_identifier {
    ($($t:ty),*) => {
        $(
            impl IntoIdentifier for $t {
                fn into_identifier(self) -> Result<Option<String>> {
                    Ok(Some(self.to_string()))
                }
            }
        )*
    };
}

numeric_identifier!(u32, u64, u128, i32, i64, usize);

impl<T: IntoIdentifier> IntoIdentifier for Option<T> {
    fn into_identifier(self) -> Result<Option<String>> {
        match self {
            Some(v) => v.into_identifier(),
            None => Ok(None),
        }
    }
}

impl<T: IntoIdentifier> IntoIdentifier for std::io::Result<T> {
    fn into_identifier(self) -> Result<Option<String>> {
        self.map_err(Error::Io)?.into_identifier()
    }
}
