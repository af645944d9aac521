//! Schema contract checks for `contracts/`. All checks live in `tests/`.
