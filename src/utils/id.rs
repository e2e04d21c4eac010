use std::marker::PhantomData;

/// Counter that hands out unique IDs of type `T`.
///
/// Every [`Root`](crate::root::Root) owns its own counters, so IDs are deterministic for a given
/// sequence of events. The underlying `u32` will eventually wrap around.
#[derive(Debug)]
pub struct IdCounter<T> {
    value: u32,
    _id: PhantomData<T>,
}

impl<T: From<u32>> IdCounter<T> {
    pub const fn new() -> Self {
        Self {
            value: 1,
            _id: PhantomData,
        }
    }

    pub fn next(&mut self) -> T {
        let id = self.value;
        self.value = self.value.wrapping_add(1);
        T::from(id)
    }
}

impl<T: From<u32>> Default for IdCounter<T> {
    fn default() -> Self {
        Self::new()
    }
}
