//! Test doubles shared by unit tests.
