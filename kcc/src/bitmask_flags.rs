use num_traits::{One, PrimInt};

/// Flag enum whose variants each own one bit of `Storage`.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // `bit_index()` must stay below the bit width of `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// Packed booleans, as replicated in the snapshot flags word and the feature set.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, flag: U) -> bool {
        (self.bits & flag.mask()) != T::zero()
    }

    pub fn set<U: FlagBitmask<Storage = T>>(&mut self, flag: U, value: bool) {
        self.bits = if value {
            self.bits | flag.mask()
        } else {
            self.bits & !flag.mask()
        };
    }
}

/// Declare a `#[repr(u8)]` flag enum; declaration order gives the bit index.
///
/// ```rust
/// kcc::define_bitmask_flags!(ContactFlag, u8, {
///     Touching,
///     Sliding,
/// });
/// ```
#[macro_export]
macro_rules! define_bitmask_flags {
    ($name:ident, $storage:ty, { $($variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant),*
        }

        impl $crate::bitmask_flags::FlagBitmask for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    define_bitmask_flags!(TestFlag, u8, { A, B, C });

    #[test]
    fn set_and_query_single_flags() {
        let mut flags = BitmaskFlags::<u8>::default();
        flags.set(TestFlag::B, true);
        assert!(flags.has(TestFlag::B));
        assert!(!flags.has(TestFlag::A));
        assert_eq!(flags.bits, 0b010);

        flags.set(TestFlag::C, true);
        flags.set(TestFlag::B, false);
        assert!(!flags.has(TestFlag::B));
        assert_eq!(flags.bits, 0b100);

        // Clearing an unset flag is a no-op.
        flags.set(TestFlag::A, false);
        assert_eq!(flags.bits, 0b100);
    }
}
