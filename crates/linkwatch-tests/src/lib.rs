//! Empty library target; all coverage lives under `tests/`.
