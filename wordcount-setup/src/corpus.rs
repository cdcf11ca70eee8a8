//! Fixed sample text inserted into the input table.
//!
//! Both lists are indexed by `category_id`. Index 0 is never used.

// Public domain, http://en.wikisource.org/wiki/If%E2%80%94
const TITLES: [&str; 6] = ["", "A", "B", "C", "D", "E"];

const BODIES: [&str; 6] = [
    "",
    "If you can keep your head when all about you",
    "Are losing theirs and blaming it on you",
    "If you can trust yourself when all men doubt you,",
    "But make allowance for their doubting too:",
    "If you can wait and not be tired by waiting,",
];

/// Highest index holding a real entry.
pub const MAX_ENTRY: usize = TITLES.len() - 1;

/// Title stored for rows of the given category.
///
/// # Panics
///
/// Panics if `index` is greater than [`MAX_ENTRY`].
pub fn title(index: usize) -> &'static str {
    TITLES[index]
}

/// Body stored for rows of the given category.
///
/// # Panics
///
/// Panics if `index` is greater than [`MAX_ENTRY`].
pub fn body(index: usize) -> &'static str {
    BODIES[index]
}
