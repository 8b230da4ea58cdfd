//! Value types that can live in an [`ArrayHandle`](crate::data::ArrayHandle).

use std::any::TypeId;
use std::fmt::{self, Debug};

/// Index type used for points, cells, counts and offsets.
pub type Id = usize;

/// Scalar field type.
pub type Scalar = f32;

/// Three-component coordinate / vector value.
pub type Vector3 = [Scalar; 3];

/// Point-usage mask entry (0 = unused, 1 = used).
pub type Mask = u8;

/// Anything that can be stored in an array handle and moved to a backend.
///
/// Elements are plain values: they are copied in and out of parallel regions
/// and default-initialised when a backend allocates output storage.
pub trait Element: Copy + Default + Debug + Send + Sync + 'static {}

impl<T> Element for T where T: Copy + Default + Debug + Send + Sync + 'static {}

/// Runtime identity of an element type, used to check bindings.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    pub fn of<T: Element>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn is<T: Element>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Stencil values for stream compaction: an entry is kept when it is truthy.
pub trait Truthy: Element {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    #[inline]
    fn is_truthy(&self) -> bool {
        *self
    }
}

macro_rules! impl_truthy_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Truthy for $t {
                #[inline]
                fn is_truthy(&self) -> bool {
                    *self != 0
                }
            }
        )*
    };
}

impl_truthy_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Component-wise linear interpolation between two coordinates.
#[inline]
pub fn lerp(a: Vector3, b: Vector3, t: Scalar) -> Vector3 {
    [
        a[0] + t * (b[0] - a[0]),
        a[1] + t * (b[1] - a[1]),
        a[2] + t * (b[2] - a[2]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_follows_nonzero() {
        assert!(!0u8.is_truthy());
        assert!(3i64.is_truthy());
        assert!(true.is_truthy());
        assert!(!false.is_truthy());
    }

    #[test]
    fn value_type_identity() {
        assert_eq!(ValueType::of::<f32>(), ValueType::of::<f32>());
        assert_ne!(ValueType::of::<f32>(), ValueType::of::<Id>());
        assert!(ValueType::of::<Vector3>().is::<[f32; 3]>());
    }

    #[test]
    fn lerp_endpoints() {
        let a = [0.0, 0.0, 0.0];
        let b = [2.0, 4.0, -2.0];
        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
        assert_eq!(lerp(a, b, 0.5), [1.0, 2.0, -1.0]);
    }
}
