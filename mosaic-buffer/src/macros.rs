/// Builds a heap-owned [`Buffer`](crate::Buffer) with `vec!` syntax.
#[macro_export]
macro_rules! buffer {
    ($elem:expr; $n:expr) => {
        $crate::Buffer::full($elem, $n)
    };
    ($($x:expr),* $(,)?) => {
        $crate::Buffer::from(vec![$($x),*])
    };
}

/// Builds a [`BufferMut`](crate::BufferMut) with `vec!` syntax.
#[macro_export]
macro_rules! buffer_mut {
    ($elem:expr; $n:expr) => {
        $crate::BufferMut::full($elem, $n)
    };
    ($($x:expr),* $(,)?) => {
        $crate::BufferMut::from(vec![$($x),*])
    };
}
