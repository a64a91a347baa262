//! Per-dispatch state handed to a handler.

use casper_db::{DataError, DataStores, ReadContext, WriteContext};

/// Projects entities into response shapes.
///
/// Projections are plain `From` impls next to the response types, so the
/// mapper carries no configuration of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper;

impl Mapper {
    /// Maps one value.
    pub fn map<S, D>(&self, source: S) -> D
    where
        D: From<S>,
    {
        D::from(source)
    }

    /// Maps every value, keeping order.
    pub fn map_all<S, D, I>(&self, sources: I) -> Vec<D>
    where
        I: IntoIterator<Item = S>,
        D: From<S>,
    {
        sources.into_iter().map(D::from).collect()
    }
}

/// The mapper and both contexts for one dispatch.
///
/// Opened when a request has been routed and dropped when its handler
/// returns, which releases both pooled connections on every exit path.
pub struct HandlerScope {
    /// Entity to response projector.
    pub mapper: Mapper,
    /// Write context with an empty unit of work.
    pub write: WriteContext,
    /// Read context.
    pub read: ReadContext,
}

impl HandlerScope {
    /// Opens a fresh write and read context.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Connectivity` if either pool has no connection
    /// available.
    pub async fn open(stores: &DataStores) -> Result<Self, DataError> {
        let write = stores.open_write().await?;
        let read = stores.open_read().await?;
        Ok(Self {
            mapper: Mapper,
            write,
            read,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Celsius(i32);

    #[derive(Debug, PartialEq)]
    struct Label(String);

    impl From<Celsius> for Label {
        fn from(c: Celsius) -> Self {
            Label(format!("{}C", c.0))
        }
    }

    #[test]
    fn mapper_projects_through_from() {
        let label: Label = Mapper.map(Celsius(21));
        assert_eq!(label, Label("21C".into()));

        let labels: Vec<Label> = Mapper.map_all(vec![Celsius(1), Celsius(-3)]);
        assert_eq!(labels, vec![Label("1C".into()), Label("-3C".into())]);
    }
}
