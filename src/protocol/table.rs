//! Fixed table layout shared with the server
//!
//! The physical pocket order must match the server's fairness validation
//! exactly: settle targets index into it.

use serde::{Deserialize, Serialize};

/// Number of pockets on a single-zero wheel
pub const POCKET_COUNT: usize = 37;

/// Physical pocket order, clockwise from the zero pocket
pub const WHEEL_ORDER: [u8; POCKET_COUNT] = [
    0, 32, 15, 19, 4, 21, 2, 25, 17, 34, 6, 27, 13, 36, 11, 30, 8, 23, 10, 5, 24, 16, 33, 1, 20,
    14, 31, 9, 22, 18, 29, 7, 28, 12, 35, 3, 26,
];

pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

pub const BLACK_NUMBERS: [u8; 18] = [
    2, 4, 6, 8, 10, 11, 13, 15, 17, 20, 22, 24, 26, 28, 29, 31, 33, 35,
];

/// Pocket colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PocketColor {
    Red,
    Black,
    Green,
}

/// Colour of a pocket, `None` for numbers that are not on the wheel
pub fn pocket_color(number: u8) -> Option<PocketColor> {
    if number == 0 {
        Some(PocketColor::Green)
    } else if RED_NUMBERS.contains(&number) {
        Some(PocketColor::Red)
    } else if BLACK_NUMBERS.contains(&number) {
        Some(PocketColor::Black)
    } else {
        None
    }
}

/// Position of a number in the physical pocket order
pub fn pocket_index(number: u8) -> Option<usize> {
    WHEEL_ORDER.iter().position(|&n| n == number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_wheel_order_is_a_permutation() {
        let unique: HashSet<u8> = WHEEL_ORDER.iter().copied().collect();
        assert_eq!(unique.len(), POCKET_COUNT);
        assert!(unique.iter().all(|&n| n <= 36));
    }

    #[test]
    fn test_colour_partition() {
        let red: HashSet<u8> = RED_NUMBERS.iter().copied().collect();
        let black: HashSet<u8> = BLACK_NUMBERS.iter().copied().collect();
        assert!(red.is_disjoint(&black));
        assert_eq!(red.len() + black.len(), 36);
        assert!(!red.contains(&0) && !black.contains(&0));
    }

    #[test]
    fn test_pocket_lookup() {
        assert_eq!(pocket_index(0), Some(0));
        assert_eq!(pocket_index(26), Some(36));
        assert_eq!(pocket_index(17), Some(8));
        assert_eq!(pocket_index(37), None);
        assert_eq!(pocket_color(0), Some(PocketColor::Green));
        assert_eq!(pocket_color(10), Some(PocketColor::Black));
        assert_eq!(pocket_color(37), None);
    }
}
