use orbiter_types::RecordMeta;

/// Implemented by every stored record type so the generic `Collection<T>`
/// can read/bump identity and the optimistic-concurrency version without
/// knowing the concrete type.
pub trait HasMeta {
    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> uuid::Uuid {
        self.meta().id
    }

    fn version(&self) -> u64 {
        self.meta().version
    }
}

macro_rules! impl_has_meta {
    ($ty:ty) => {
        impl HasMeta for $ty {
            fn meta(&self) -> &RecordMeta {
                &self.meta
            }
            fn meta_mut(&mut self) -> &mut RecordMeta {
                &mut self.meta
            }
        }
    };
}

impl_has_meta!(orbiter_types::Pack);
impl_has_meta!(orbiter_types::Node);
impl_has_meta!(orbiter_types::Service);
impl_has_meta!(orbiter_types::Namespace);

impl HasMeta for orbiter_types::Pod {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
