//! Assertions which are enabled depending on [`HEXGEN_ASSERT_LEVEL_DEFINITION`].
//!
//! Simple assertions are cheap and always on; the more expensive levels re-verify results of the
//! checkers and are only enabled through the `debug-checks` feature.

#[cfg(not(feature = "debug-checks"))]
pub const HEXGEN_ASSERT_LEVEL_DEFINITION: u8 = HEXGEN_ASSERT_SIMPLE;
#[cfg(feature = "debug-checks")]
pub const HEXGEN_ASSERT_LEVEL_DEFINITION: u8 = HEXGEN_ASSERT_ADVANCED;

pub const HEXGEN_ASSERT_SIMPLE: u8 = 1;
pub const HEXGEN_ASSERT_MODERATE: u8 = 2;
pub const HEXGEN_ASSERT_ADVANCED: u8 = 3;

#[macro_export]
macro_rules! hexgen_assert_simple {
    ($($arg:tt)*) => {
        if $crate::asserts::HEXGEN_ASSERT_LEVEL_DEFINITION >= $crate::asserts::HEXGEN_ASSERT_SIMPLE {
            assert!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! hexgen_assert_moderate {
    ($($arg:tt)*) => {
        if $crate::asserts::HEXGEN_ASSERT_LEVEL_DEFINITION >= $crate::asserts::HEXGEN_ASSERT_MODERATE {
            assert!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! hexgen_assert_advanced {
    ($($arg:tt)*) => {
        if $crate::asserts::HEXGEN_ASSERT_LEVEL_DEFINITION >= $crate::asserts::HEXGEN_ASSERT_ADVANCED {
            assert!($($arg)*);
        }
    };
}
